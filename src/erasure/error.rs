use thiserror::Error;

use crate::database::DatabaseError;

/// Errors returned by the coordinator before any data is touched.
///
/// None of these are retried automatically; each needs new input from the
/// caller (a fresh code, waiting out a lockout, waiting for the prior run).
#[derive(Debug, Error)]
pub enum ErasureError {
    /// Bad, expired, superseded or reused code, or a rejected challenge.
    /// Deliberately carries no detail.
    #[error("unauthorized")]
    Unauthorized,

    #[error("locked for {remaining_seconds}s")]
    Locked { remaining_seconds: i64 },

    #[error("an erasure for {0} is already in progress")]
    AlreadyInProgress(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErasureError {
    pub fn locked(remaining: chrono::Duration) -> Self {
        // Round up so a caller never sees "0 seconds" while still locked
        let millis = remaining.num_milliseconds().max(0);
        ErasureError::Locked {
            remaining_seconds: (millis + 999) / 1000,
        }
    }
}

/// Failures of the durable coordination stores (codes, attempts, locks, journal)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Sqlx(e) => StoreError::Database(e),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_rounds_remaining_up() {
        match ErasureError::locked(chrono::Duration::milliseconds(1500)) {
            ErasureError::Locked { remaining_seconds } => assert_eq!(remaining_seconds, 2),
            other => panic!("unexpected {:?}", other),
        }
        match ErasureError::locked(chrono::Duration::seconds(-3)) {
            ErasureError::Locked { remaining_seconds } => assert_eq!(remaining_seconds, 0),
            other => panic!("unexpected {:?}", other),
        }
    }
}
