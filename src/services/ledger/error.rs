use thiserror::Error;

use crate::store::StoreError;

/// Outcome kinds the ledger reports to the request layer. Raw storage
/// errors are folded into `StorageFailure`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("no seats were selected")]
    EmptySelection,

    #[error("invalid seat codes: {}", .0.join(", "))]
    InvalidFormat(Vec<String>),

    #[error("seats already taken: {}", .0.join(", "))]
    SeatsUnavailable(Vec<String>),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("showtime {showtime_id} is busy, please retry")]
    Conflict { showtime_id: i64 },

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            StoreError::Conflict { id, .. } => LedgerError::Conflict { showtime_id: id },
            other => LedgerError::StorageFailure(other.to_string()),
        }
    }
}
