use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::*;

use sqlite::{LogoutRecord, NewUser, PersistedUser, Storage, StorageFactory, UserId};

use super::handlers::RegisterUser;
use super::templates::Templates;
use crate::config::Config;

pub struct AppState {
    pub storage: Arc<dyn StorageFactory>,
    pub templates: Templates,
    pub env: Config,
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("hashing password failed: {}", e))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

impl AppState {
    pub fn new(storage: Arc<dyn StorageFactory>, env: Config) -> Result<Self> {
        let templates = Templates::new(&env.templates_dir)?;

        Ok(Self {
            storage,
            templates,
            env,
        })
    }

    /// Storage is synchronous, so every use happens on the blocking pool
    /// with its own connection.
    async fn with_storage<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&dyn Storage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let factory = self.storage.clone();

        tokio::task::spawn_blocking(move || {
            let storage = factory.create_storage()?;
            work(storage.as_ref())
        })
        .await?
    }

    pub async fn register_user(&self, user: RegisterUser) -> Result<UserId> {
        info!(username = %user.username, "registering");

        let password_hash = hash_password(&user.password)?;
        let creating = NewUser {
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash,
        };

        let id = self
            .with_storage(move |storage| storage.create_user(&creating))
            .await?;

        info!(%id, "registered!");

        Ok(id)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Option<PersistedUser>> {
        let user = {
            let username = username.to_owned();
            self.with_storage(move |storage| storage.find_user_by_username(&username))
                .await?
        };

        let Some(user) = user else {
            info!(%username, "login:unknown");
            return Ok(None);
        };

        if !verify_password(password, &user.password_hash) {
            info!(%username, "login:invalid");
            return Ok(None);
        }

        info!(%username, id = %user.id, "login");

        Ok(Some(user))
    }

    pub async fn record_logout(&self, user_id: UserId, time: DateTime<Utc>) -> Result<()> {
        self.with_storage(move |storage| storage.save_logout(&user_id, time))
            .await
    }

    pub async fn last_logout(&self, user_id: UserId) -> Result<Option<LogoutRecord>> {
        let history = self
            .with_storage(move |storage| storage.logout_history(&user_id))
            .await?;

        Ok(history.last().cloned())
    }
}
