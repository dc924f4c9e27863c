use thiserror::Error;

use crate::PlayerId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds: {needed} needed but only {available} available")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Cannot transfer credits to the same account")]
    SameAccount,

    #[error("No bank account registered for player {0}")]
    NoAccount(PlayerId),

    #[error("Amount must be greater than zero")]
    InvalidAmount,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("{0}")]
    PreconditionUnmet(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionUnmet(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
