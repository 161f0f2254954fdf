use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::{config::Config, make_storage};

#[derive(Debug, Args, Clone)]
pub struct Command {
    #[arg(short, long, value_name = "FILE")]
    database: Option<String>,
}

pub fn execute_command(cmd: &Command) -> Result<()> {
    let path = match &cmd.database {
        Some(path) => path.clone(),
        None => Config::database_path_from_env(),
    };

    make_storage(&path)?;

    info!(%path, "migrated");

    Ok(())
}
