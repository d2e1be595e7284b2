//! Error types for the idempotent sink

use thiserror::Error;

/// Result type for sink operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Failures other than a uniqueness conflict. A conflict is not an error: it
/// is reported as `InsertResult { row_count: 0 }`.
#[derive(Error, Debug)]
pub enum PersistError {
    /// Database operation failed (connection, pool timeout, rejected value)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record coordinates are unusable as a natural key
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl PersistError {
    /// Connection-level failures that a later redelivery may get past
    pub fn is_transient(&self) -> bool {
        match self {
            PersistError::Database(sqlx_err) => matches!(
                sqlx_err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            PersistError::InvalidRecord(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        assert!(PersistError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(PersistError::Database(sqlx::Error::PoolClosed).is_transient());
        assert!(!PersistError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!PersistError::InvalidRecord("negative offset".to_string()).is_transient());
    }
}
