//! Board server commands: `kanban serve` and `kanban init`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use kanban::board::server;
use kanban::config::ServerConfig;

pub async fn cmd_serve(
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
    config_file: Option<&Path>,
) -> Result<()> {
    let mut config = ServerConfig::load(config_file)?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }
    if dev {
        config.dev_mode = true;
    }

    server::start_server(config).await
}

pub fn cmd_init(db_path: Option<PathBuf>) -> Result<()> {
    let mut config = ServerConfig::load(None)?;
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }
    server::open_database(&config)?;
    println!(
        "{} {}",
        console::style("Board database initialized at").green(),
        config.db_path.display()
    );
    Ok(())
}
