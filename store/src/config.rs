use std::{path::PathBuf, str::FromStr, sync::Arc};

use crate::{DocumentStore, FileStore, MemoryStore, NoopStore, SqliteStore, StoreError};

pub const DEFAULT_LOCATION: &str = "data/store";

/// Where documents live. Parsed from strings like `sqlite:bot.db`,
/// `sqlite::memory:`, `memory`, `noop`, `file:some/dir` or a bare directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Sqlite(String),
    Memory,
    Noop,
}

impl FromStr for StoreLocation {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StoreError::UnknownLocation(s.to_string()));
        }
        Ok(match s {
            "memory" => StoreLocation::Memory,
            "noop" => StoreLocation::Noop,
            _ if s.starts_with("sqlite:") => StoreLocation::Sqlite(s.to_string()),
            _ => StoreLocation::File(PathBuf::from(s.strip_prefix("file:").unwrap_or(s))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: StoreLocation,
    pub pool_size: u32,
}

impl StoreConfig {
    /// Resolves the location from, in order: the CLI argument, `HEIST_STORE`,
    /// `DATABASE_URL`, the YAML value, and finally a file store under
    /// `data/store`.
    pub fn from_cli_or_env_or_yaml(
        cli_arg: Option<String>,
        yaml_config: Option<String>,
    ) -> Result<Self, StoreError> {
        let location = pick_location(
            cli_arg,
            std::env::var("HEIST_STORE").ok(),
            std::env::var("DATABASE_URL").ok(),
            yaml_config,
        );
        Ok(Self {
            location: location.parse()?,
            pool_size: 5,
        })
    }

    pub async fn open(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let store: Arc<dyn DocumentStore> = match &self.location {
            StoreLocation::File(dir) => {
                tracing::info!("Using file store at {}", dir.display());
                Arc::new(FileStore::new(dir.clone()))
            }
            StoreLocation::Sqlite(url) => Arc::new(SqliteStore::connect(url, self.pool_size).await?),
            StoreLocation::Memory => {
                tracing::warn!("Using in-memory store; nothing will survive a restart");
                Arc::new(MemoryStore::new())
            }
            StoreLocation::Noop => {
                tracing::warn!("Persistence disabled");
                Arc::new(NoopStore)
            }
        };
        Ok(store)
    }
}

fn pick_location(
    cli_arg: Option<String>,
    env_store: Option<String>,
    env_database_url: Option<String>,
    yaml_config: Option<String>,
) -> String {
    cli_arg
        .or(env_store)
        .or(env_database_url)
        .or(yaml_config)
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
}
