use crate::state::InvalidTransition;
use thiserror::Error;

/// Errors that stop a whole pass.
///
/// A single application never raises one of these; its failure is recorded
/// as a [`FailureReason`](crate::FailureReason) in the report instead.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("sheet error: {0}")]
    Sheet(#[from] jobtrack_db::DatabaseError),

    #[error("journal error: {0}")]
    Journal(String),

    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

pub type Result<T> = std::result::Result<T, ScanError>;
