//! Store-level error taxonomy.
//!
//! `NotFound` and `EditConflict` are the outcomes callers act on; everything
//! else is an opaque failure that the HTTP layer logs and answers with 500.

use crate::executor::ExecError;
use crate::pool::PoolError;
use crate::transaction::TransactionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("database error: {0}")]
    Database(ExecError),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("invalid stored data: {0}")]
    Decode(String),
}

impl From<ExecError> for StoreError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Timeout(msg) => StoreError::Timeout(msg),
            other => StoreError::Database(other),
        }
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        ExecError::from(err).into()
    }
}

impl From<may_postgres::Error> for StoreError {
    fn from(err: may_postgres::Error) -> Self {
        StoreError::Database(ExecError::PostgresError(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exec_timeout_becomes_store_timeout() {
        let err: StoreError = ExecError::Timeout("deadline".to_string()).into();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[test]
    fn test_transaction_deadline_becomes_store_timeout() {
        let err: StoreError = TransactionError::DeadlineExceeded(Duration::from_secs(1)).into();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[test]
    fn test_other_exec_errors_are_database_errors() {
        let err: StoreError = ExecError::QueryError("bad".to_string()).into();
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(err.to_string(), "database error: Query error: bad");
    }
}
