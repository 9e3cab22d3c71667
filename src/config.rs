//! Configuration for the board server and the CLI client.
//!
//! Server settings are layered: built-in defaults, then `kanban.toml`,
//! then the environment (including `.env`), then CLI flags.
//!
//! ```toml
//! [server]
//! port = 8000
//! db_path = ".kanban/board.db"
//! dev = false
//!
//! [auth]
//! supabase_url = "https://example.supabase.co"
//! supabase_anon_key = "..."
//! # or, for local development:
//! dev_tokens = "token-a:user-a,token-b:user-b"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "kanban.toml";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DB_PATH: &str = ".kanban/board.db";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Which identity provider verifies bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityConfig {
    Supabase { url: String, anon_key: String },
    /// `token:user,token:user`
    DevTokens(String),
}

// ── File layer ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub dev: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub dev_tokens: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Like [`FileConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

// ── Server ────────────────────────────────────────────────────────────

/// Configuration for the board server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub identity: Option<IdentityConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            dev_mode: false,
            identity: None,
        }
    }
}

impl ServerConfig {
    /// Load from the config file (explicit, or `kanban.toml` if present)
    /// and the process environment. CLI overrides are applied by the caller.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let file = match config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?,
        };
        Self::resolve(&file, |key| std::env::var(key).ok())
    }

    /// Merge a file layer with an environment lookup.
    pub fn resolve(file: &FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = file.server.port {
            config.port = port;
        }
        if let Some(path) = &file.server.db_path {
            config.db_path = path.clone();
        }
        if let Some(dev) = file.server.dev {
            config.dev_mode = dev;
        }

        if let Some(port) = lookup("KANBAN_PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid KANBAN_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("KANBAN_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        let url = lookup("SUPABASE_URL").or_else(|| file.auth.supabase_url.clone());
        let anon_key = lookup("SUPABASE_ANON_KEY").or_else(|| file.auth.supabase_anon_key.clone());
        let dev_tokens = lookup("KANBAN_DEV_TOKENS").or_else(|| file.auth.dev_tokens.clone());

        config.identity = match (url, anon_key, dev_tokens) {
            (Some(url), Some(anon_key), _) => Some(IdentityConfig::Supabase { url, anon_key }),
            (Some(_), None, _) | (None, Some(_), _) => {
                bail!("SUPABASE_URL and SUPABASE_ANON_KEY must be set together")
            }
            (None, None, Some(tokens)) => Some(IdentityConfig::DevTokens(tokens)),
            (None, None, None) => None,
        };

        Ok(config)
    }
}

// ── Client ────────────────────────────────────────────────────────────

/// Where the CLI client reaches the board server, and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL, None)
    }
}
