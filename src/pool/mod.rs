//! Fixed-size connection pool for `may_postgres`.
//!
//! The pool opens `max_connections` clients up front and parks the idle ones
//! in a `may` mpmc channel. `acquire` waits on that channel, which suspends
//! the calling coroutine rather than the worker thread, for at most the
//! configured acquire timeout. A [`PooledConnection`] hands its client back
//! when dropped; a client whose socket has closed is replaced instead.

use crate::config::DatabaseConfig;
use crate::connection::{check_connection_health, connect, ConnectionError};
use crate::executor::{instrumented, ExecError, Executor};
use may::sync::mpmc;
use may_postgres::types::ToSql;
use may_postgres::{Client, Row};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Pool error type
#[derive(Debug)]
pub enum PoolError {
    /// No connection became idle within the acquire timeout
    Timeout(Duration),
    /// Opening a (replacement) connection failed
    Connection(ConnectionError),
    /// Invalid pool settings
    Config(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Timeout(d) => {
                write!(f, "Timed out after {:?} waiting for a database connection", d)
            }
            PoolError::Connection(e) => {
                write!(f, "Pool connection error: {}", e)
            }
            PoolError::Config(s) => {
                write!(f, "Pool configuration error: {}", s)
            }
        }
    }
}

impl std::error::Error for PoolError {}

impl From<ConnectionError> for PoolError {
    fn from(err: ConnectionError) -> Self {
        PoolError::Connection(err)
    }
}

struct Shared {
    url: String,
    statement_timeout_ms: u64,
    acquire_timeout: Duration,
    size: usize,
    /// Slots whose client was lost and could not be reopened yet.
    vacant: AtomicUsize,
}

/// A cloneable handle to the pool; every store holds one.
#[derive(Clone)]
pub struct DbPool {
    idle_tx: mpmc::Sender<Client>,
    idle_rx: mpmc::Receiver<Client>,
    shared: Arc<Shared>,
}

impl DbPool {
    /// Opens `config.max_connections` connections.
    ///
    /// Fails if any of them cannot be opened, so a misconfigured database is
    /// reported at startup rather than on the first request.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, PoolError> {
        if config.max_connections == 0 {
            return Err(PoolError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let (idle_tx, idle_rx) = mpmc::channel();
        let shared = Arc::new(Shared {
            url: config.url.clone(),
            statement_timeout_ms: config.statement_timeout_ms,
            acquire_timeout: config.pool_timeout(),
            size: config.max_connections,
            vacant: AtomicUsize::new(0),
        });

        for _ in 0..config.max_connections {
            let client = connect(&shared.url, shared.statement_timeout_ms)?;
            // The receiver lives in `idle_rx` below, so send cannot fail.
            let _ = idle_tx.send(client);
        }

        log::info!(
            "database pool ready with {} connections (acquire timeout {:?})",
            shared.size,
            shared.acquire_timeout
        );

        Ok(Self {
            idle_tx,
            idle_rx,
            shared,
        })
    }

    /// Number of connection slots.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Waits for an idle connection.
    pub fn acquire(&self) -> Result<PooledConnection, PoolError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span().entered();

        let start = Instant::now();
        let result = self.take_idle();

        #[cfg(feature = "metrics")]
        METRICS.record_pool_wait(start.elapsed());
        #[cfg(not(feature = "metrics"))]
        let _ = start;

        result.map(|client| PooledConnection {
            client: Some(client),
            pool: self.clone(),
        })
    }

    fn take_idle(&self) -> Result<Client, PoolError> {
        if let Ok(client) = self.idle_rx.try_recv() {
            return Ok(client);
        }

        if self.claim_vacant_slot() {
            match connect(&self.shared.url, self.shared.statement_timeout_ms) {
                Ok(client) => return Ok(client),
                Err(e) => {
                    self.shared.vacant.fetch_add(1, Ordering::AcqRel);
                    return Err(e.into());
                }
            }
        }

        self.idle_rx
            .recv_timeout(self.shared.acquire_timeout)
            .map_err(|_| PoolError::Timeout(self.shared.acquire_timeout))
    }

    fn claim_vacant_slot(&self) -> bool {
        self.shared
            .vacant
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    fn release(&self, client: Client) {
        if !client.is_closed() {
            let _ = self.idle_tx.send(client);
            return;
        }

        log::warn!("discarding closed database connection");
        match connect(&self.shared.url, self.shared.statement_timeout_ms) {
            Ok(fresh) => {
                let _ = self.idle_tx.send(fresh);
            }
            Err(e) => {
                log::error!("could not replace closed database connection: {}", e);
                self.shared.vacant.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}

/// A connection checked out of the pool.
pub struct PooledConnection {
    client: Option<Client>,
    pool: DbPool,
}

impl PooledConnection {
    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        // Only `Drop` takes the client out.
        match &self.client {
            Some(client) => client,
            None => unreachable!("pooled connection used after release"),
        }
    }

    /// `SELECT 1` on this connection.
    pub fn ping(&self) -> Result<bool, ConnectionError> {
        check_connection_health(self.client())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}

impl Executor for PooledConnection {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecError> {
        instrumented(query, || self.client().execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecError> {
        instrumented(query, || self.client().query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecError> {
        instrumented(query, || self.client().query(query, params))
    }
}
