use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH: &str = "doorway.sqlite3";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub database_path: String,
    pub port: u16,
    pub assets_dir: PathBuf,
    pub templates_dir: PathBuf,
}

fn manifest_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(name)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").with_context(|| "JWT_SECRET")?;
        let port = match std::env::var("PORT") {
            Ok(port) => port.parse().with_context(|| format!("PORT '{}'", port))?,
            Err(_) => DEFAULT_PORT,
        };
        let assets_dir = std::env::var("ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| manifest_dir("assets"));
        let templates_dir = std::env::var("TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| manifest_dir("templates"));

        Ok(Self {
            jwt_secret,
            database_path: Self::database_path_from_env(),
            port,
            assets_dir,
            templates_dir,
        })
    }

    pub fn database_path_from_env() -> String {
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into())
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            jwt_secret: "not-very-secret".to_owned(),
            database_path: sqlite::MEMORY_SPECIAL.to_owned(),
            port: DEFAULT_PORT,
            assets_dir: manifest_dir("assets"),
            templates_dir: manifest_dir("templates"),
        }
    }
}
