//! Transactions over a single pooled client.
//!
//! A `Transaction` borrows the client it runs on, so the pool guard cannot be
//! handed back while a transaction is open. A transaction that is dropped
//! without `commit` or `rollback` is rolled back, which is what keeps a
//! cancelled or panicking request from leaving the session mid-transaction.
//!
//! An optional deadline bounds the whole transaction: it is checked before
//! every statement and before `COMMIT`, and the server-side
//! `idle_in_transaction_session_timeout` is set to the same budget.

use crate::executor::{instrumented, ExecError, Executor};
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// PostgreSQL error from may_postgres
    PostgresError(PostgresError),
    /// Transaction already committed or rolled back
    TransactionClosed,
    /// The transaction ran past its deadline and was rolled back
    DeadlineExceeded(Duration),
    /// Other transaction errors
    Other(String),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {}", e)
            }
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
            TransactionError::DeadlineExceeded(d) => {
                write!(f, "Transaction exceeded its deadline of {:?}", d)
            }
            TransactionError::Other(s) => {
                write!(f, "Transaction error: {}", s)
            }
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<PostgresError> for TransactionError {
    fn from(err: PostgresError) -> Self {
        TransactionError::PostgresError(err)
    }
}

impl From<TransactionError> for ExecError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::PostgresError(e) => ExecError::PostgresError(e),
            TransactionError::TransactionClosed => {
                ExecError::Other("Transaction closed".to_string())
            }
            TransactionError::DeadlineExceeded(d) => {
                ExecError::Timeout(format!("transaction deadline of {:?} exceeded", d))
            }
            TransactionError::Other(s) => ExecError::Other(s),
        }
    }
}

/// A database transaction on a borrowed client.
///
/// ```no_run
/// use gudang::executor::Executor;
/// use gudang::pool::DbPool;
/// use gudang::transaction::Transaction;
///
/// # fn example(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
/// let conn = pool.acquire()?;
/// let tx = Transaction::begin(conn.client(), None)?;
/// tx.execute("DELETE FROM stok_detail WHERE stok_id = $1", &[&"a-stock-id"])?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'c> {
    client: &'c Client,
    closed: bool,
    budget: Option<Duration>,
    started: Instant,
}

impl<'c> Transaction<'c> {
    /// Start a transaction, optionally bounded by `budget`.
    pub fn begin(client: &'c Client, budget: Option<Duration>) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        client.execute("BEGIN", &[]).map_err(TransactionError::from)?;

        let tx = Self {
            client,
            closed: false,
            budget,
            started: Instant::now(),
        };

        if let Some(budget) = budget {
            // SET LOCAL takes no bind parameters; the value is a plain integer.
            let sql = format!(
                "SET LOCAL idle_in_transaction_session_timeout = {}",
                budget.as_millis()
            );
            // On failure `tx` drops here and rolls the BEGIN back.
            tx.client
                .execute(sql.as_str(), &[])
                .map_err(TransactionError::from)?;
        }

        Ok(tx)
    }

    /// Commit the transaction
    ///
    /// Fails with `DeadlineExceeded` (after rolling back) when the budget is
    /// already spent.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        if let Err(e) = self.check_deadline() {
            self.finish("ROLLBACK")?;
            return Err(e);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        self.finish("COMMIT")
    }

    /// Rollback the transaction
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.finish("ROLLBACK")
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        self.client
    }

    /// Check if the transaction is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn finish(&mut self, statement: &'static str) -> Result<(), TransactionError> {
        // Closed even when the statement fails: the session is unusable for
        // this transaction either way, and Drop must not retry.
        self.closed = true;
        let result = self.client.execute(statement, &[]).map(|_| ());

        #[cfg(feature = "metrics")]
        METRICS.record_transaction(if statement == "COMMIT" { "commit" } else { "rollback" });

        result.map_err(TransactionError::from)
    }

    fn check_deadline(&self) -> Result<(), TransactionError> {
        match self.budget {
            Some(budget) if self.started.elapsed() > budget => {
                Err(TransactionError::DeadlineExceeded(budget))
            }
            _ => Ok(()),
        }
    }

    fn guard(&self) -> Result<(), ExecError> {
        if self.closed {
            return Err(ExecError::Other("Transaction is closed".to_string()));
        }
        self.check_deadline().map_err(ExecError::from)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        log::warn!("transaction dropped while open, rolling back");
        if let Err(e) = self.finish("ROLLBACK") {
            log::error!("rollback of abandoned transaction failed: {}", e);
        }
    }
}

impl Executor for Transaction<'_> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecError> {
        self.guard()?;
        instrumented(query, || self.client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecError> {
        self.guard()?;
        instrumented(query, || self.client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecError> {
        self.guard()?;
        instrumented(query, || self.client.query(query, params))
    }
}

/// Runs `work` inside a transaction on `client`.
///
/// Commits when `work` returns `Ok`, rolls back when it returns `Err`. A
/// failed rollback is logged and the original error is returned.
pub fn run_in_transaction<T, E, F>(client: &Client, budget: Option<Duration>, work: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<TransactionError>,
{
    let tx = Transaction::begin(client, budget)?;
    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                log::error!("rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
