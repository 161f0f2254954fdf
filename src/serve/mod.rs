use anyhow::Result;
use clap::Args;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::*;

use crate::{config::Config, make_storage};

mod error;
mod handlers;
mod jwt_auth;
mod route;
mod state;
mod templates;

#[cfg(test)]
mod tests;

use state::AppState;

#[derive(Debug, Args)]
pub struct Command {
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long, value_name = "FILE")]
    database: Option<String>,
}

impl Command {
    fn config(&self) -> Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(database) = &self.database {
            config.database_path = database.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
pub async fn execute_command(cmd: &Command) -> Result<()> {
    info!("serving");

    let config = cmd.config()?;
    let storage = make_storage(&config.database_path)?;
    let port = config.port;

    let app_state = Arc::new(AppState::new(storage, config)?);
    let app = route::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!();

    info!("signal received, starting graceful shutdown");
}
