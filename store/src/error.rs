use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document id: {0:?}")]
    InvalidId(String),

    #[error("Unknown store location: {0}")]
    UnknownLocation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
