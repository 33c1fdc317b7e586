// Configuration - defaults, then admin-views.toml, then ADMIN_VIEWS_* env
//
// Nested keys use a double underscore in the environment, e.g.
// ADMIN_VIEWS_BACKEND__KIND=remote or ADMIN_VIEWS_SERVER__PORT=8080.

use crate::client::DataClient;
use crate::db::{seed_demo_data, SqliteClient};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_NAME: &str = "admin-views";
pub const ENV_PREFIX: &str = "ADMIN_VIEWS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    /// Seed demo rows into an empty SQLite database on open.
    #[serde(default = "default_seed_on_open")]
    pub seed_on_open: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Connection id sent with db-query invocations.
    #[serde(default = "default_connection_id")]
    pub connection_id: String,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuiConfig {
    /// The dashboard owns the terminal, so its logs go here.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tui: TuiConfig,
}

fn default_backend_kind() -> BackendKind {
    BackendKind::Sqlite
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/admin-views.db")
}

const fn default_seed_on_open() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_connection_id() -> String {
    "default".to_string()
}

const fn default_per_page() -> usize {
    crate::paginate::DEFAULT_PER_PAGE
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_log_file() -> PathBuf {
    PathBuf::from("admin-views.log")
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            kind: default_backend_kind(),
            sqlite_path: default_sqlite_path(),
            seed_on_open: default_seed_on_open(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        ViewsConfig {
            connection_id: default_connection_id(),
            per_page: default_per_page(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TuiConfig {
    fn default() -> Self {
        TuiConfig {
            log_file: default_log_file(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backend: BackendConfig::default(),
            views: ViewsConfig::default(),
            server: ServerConfig::default(),
            tui: TuiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load layered configuration. An explicit path must exist; the default
    /// `admin-views.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let mut loaded: AppConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        loaded.views.per_page = loaded.views.per_page.max(1);
        Ok(loaded)
    }

    /// Build the data client the views read through.
    pub fn connect(&self) -> Result<Arc<dyn DataClient>> {
        match self.backend.kind {
            BackendKind::Sqlite => {
                let path = &self.backend.sqlite_path;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                let client = SqliteClient::open(path, &self.views.connection_id)?;
                if self.backend.seed_on_open {
                    let inserted = client.with_connection(|conn| seed_demo_data(conn, false))?;
                    if inserted > 0 {
                        info!(inserted, "seeded empty database");
                    }
                }
                Ok(Arc::new(client))
            }
            BackendKind::Remote => self.connect_remote(),
        }
    }

    #[cfg(feature = "remote")]
    fn connect_remote(&self) -> Result<Arc<dyn DataClient>> {
        let base_url = self
            .backend
            .base_url
            .as_deref()
            .context("backend.base_url is required for the remote backend")?;
        let client = crate::remote::HttpClient::new(
            base_url,
            self.backend.api_key.clone(),
            std::time::Duration::from_secs(self.backend.timeout_secs),
        )?;
        Ok(Arc::new(client))
    }

    #[cfg(not(feature = "remote"))]
    fn connect_remote(&self) -> Result<Arc<dyn DataClient>> {
        anyhow::bail!("the remote backend needs the `remote` feature")
    }
}
