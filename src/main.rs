use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kanban::config::{ClientConfig, DEFAULT_SERVER_URL};

mod cmd;

#[derive(Parser)]
#[command(name = "kanban")]
#[command(version, about = "Kanban boards with ordered, drag-and-drop task lists")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Board server URL for client commands
    #[arg(long, global = true, env = "KANBAN_URL", default_value = DEFAULT_SERVER_URL)]
    pub url: String,

    /// Bearer token for client commands
    #[arg(long, global = true, env = "KANBAN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.url, self.token.clone())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the board API server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS, bind all interfaces)
        #[arg(long)]
        dev: bool,

        /// Config file (defaults to ./kanban.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Create the board database and exit
    Init {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// List your projects
    Projects,
    /// Print a project's board
    Show {
        /// Project id
        project_id: i64,
    },
    /// Move a task to a list and index
    Move {
        /// Task id
        task_id: i64,

        /// Project the task belongs to
        #[arg(long)]
        project: i64,

        /// Source list id
        #[arg(long)]
        from: i64,

        /// Destination list id
        #[arg(long)]
        to: i64,

        /// Destination index among the destination list's tasks
        #[arg(long)]
        index: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    kanban::logging::init(cli.verbose, cli.log_json)?;

    match &cli.command {
        Commands::Serve {
            port,
            db_path,
            dev,
            config,
        } => {
            cmd::cmd_serve(*port, db_path.clone(), *dev, config.as_deref()).await?;
        }
        Commands::Init { db_path } => cmd::cmd_init(db_path.clone())?,
        Commands::Projects => cmd::cmd_projects(cli.client_config()).await?,
        Commands::Show { project_id } => cmd::cmd_show(cli.client_config(), *project_id).await?,
        Commands::Move {
            task_id,
            project,
            from,
            to,
            index,
        } => {
            cmd::cmd_move(cli.client_config(), *project, *task_id, *from, *to, *index).await?;
        }
    }

    Ok(())
}
