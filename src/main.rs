use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{error::Error, sync::Arc};
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sqlite::{ConnectionPool, Factory, StorageFactory, MEMORY_SPECIAL};

mod config;
mod migrate;
mod serve;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Serve(serve::Command),
    Migrate(migrate::Command),
}

fn get_rust_log(verbose: u8) -> String {
    let default = match verbose {
        0 => "doorway=info",
        1 => "doorway=debug,sqlite=debug",
        _ => "doorway=trace,sqlite=trace",
    };

    let mut original = std::env::var("RUST_LOG").unwrap_or_else(|_| default.into());

    if !original.contains("tower_http=") {
        original.push_str(",tower_http=info");
    }

    original
}

pub(crate) fn make_storage(path: &str) -> Result<Arc<dyn StorageFactory>> {
    let factory: Arc<dyn StorageFactory> = if path == MEMORY_SPECIAL {
        Arc::new(Factory::new(path)?)
    } else {
        Arc::new(ConnectionPool::new(path)?)
    };

    factory.migrate()?;

    Ok(factory)
}

fn main() -> Result<(), Box<dyn Error>> {
    color_backtrace::install();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(get_rust_log(cli.verbose)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("initialized, ready");

    match &cli.command {
        Some(Commands::Serve(cmd)) => Ok(serve::execute_command(cmd)?),
        Some(Commands::Migrate(cmd)) => Ok(migrate::execute_command(cmd)?),
        None => Ok(()),
    }
}
