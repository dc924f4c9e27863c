use thiserror::Error;
use types::GameError;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<types::LedgerError> for EngineError {
    fn from(err: types::LedgerError) -> Self {
        EngineError::Game(err.into())
    }
}

impl EngineError {
    /// Guard failures the invoking player should see.
    pub fn player_facing(&self) -> Option<String> {
        match self {
            EngineError::Game(GameError::Internal(_)) => None,
            EngineError::Game(err) => Some(err.to_string()),
            _ => None,
        }
    }
}
