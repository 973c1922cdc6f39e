//! The `Executor` trait: the one seam every store talks to.
//!
//! Pooled connections and transactions both implement it, so store code can
//! run the same statements inside or outside a transaction.

use may_postgres::types::ToSql;
use may_postgres::{Error as PostgresError, Row};
use std::fmt;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Executor error type
#[derive(Debug)]
pub enum ExecError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query could not be built or bound
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// A deadline expired before the statement could run
    Timeout(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            ExecError::QueryError(s) => {
                write!(f, "Query error: {s}")
            }
            ExecError::ParseError(s) => {
                write!(f, "Parse error: {s}")
            }
            ExecError::Timeout(s) => {
                write!(f, "Timeout: {s}")
            }
            ExecError::Other(s) => {
                write!(f, "Execution error: {s}")
            }
        }
    }
}

impl std::error::Error for ExecError {}

impl From<PostgresError> for ExecError {
    fn from(err: PostgresError) -> Self {
        ExecError::PostgresError(err)
    }
}

impl From<sea_query::error::Error> for ExecError {
    fn from(err: sea_query::error::Error) -> Self {
        ExecError::QueryError(err.to_string())
    }
}

/// Trait for executing database operations
///
/// # Examples
///
/// ```no_run
/// use gudang::executor::{Executor, ExecError};
///
/// # fn example(executor: &dyn Executor) -> Result<(), ExecError> {
/// let rows_affected = executor.execute("DELETE FROM brand WHERE id = $1", &[&42i64])?;
///
/// let row = executor.query_one("SELECT COUNT(*) FROM brand", &[])?;
/// let count: i64 = row.get(0);
///
/// let rows = executor.query_all("SELECT id FROM brand", &[])?;
/// let ids: Vec<i64> = rows.iter().map(|r| r.get(0)).collect();
/// # Ok(())
/// # }
/// ```
pub trait Executor {
    /// Execute a SQL statement and return the number of rows affected
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecError>;

    /// Execute a query that must return exactly one row
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecError>;

    /// Execute a query and return all rows
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecError> {
        (**self).execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecError> {
        (**self).query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecError> {
        (**self).query_all(query, params)
    }
}

/// Runs one statement with timing, error counting and a query span.
///
/// Shared by every `Executor` implementation that owns a real client.
pub(crate) fn instrumented<T>(
    query: &str,
    run: impl FnOnce() -> Result<T, PostgresError>,
) -> Result<T, ExecError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(query).entered();
    #[cfg(not(feature = "tracing"))]
    let _ = query;

    let start = Instant::now();
    let result = run().map_err(|e| {
        #[cfg(feature = "metrics")]
        METRICS.record_query_error();
        ExecError::PostgresError(e)
    });

    let duration = start.elapsed();
    #[cfg(feature = "metrics")]
    METRICS.record_query_duration(duration);
    #[cfg(not(feature = "metrics"))]
    let _ = duration;

    result
}
