//! Recording executor for unit tests of multi-statement writes.
//!
//! Only `execute` is scripted: each call is recorded with its parameters
//! rendered through `Debug`, and answers with the next scripted row count.
//! Row-returning calls fail, since `may_postgres::Row` cannot be built
//! outside the driver.

use crate::executor::{ExecError, Executor};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub params: Vec<String>,
}

#[derive(Default)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<Recorded>>,
    script: RefCell<VecDeque<Result<u64, String>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next `execute` reports `rows` affected.
    pub fn then_rows(self, rows: u64) -> Self {
        self.script.borrow_mut().push_back(Ok(rows));
        self
    }

    /// Next `execute` fails with `message`.
    pub fn then_fail(self, message: &str) -> Self {
        self.script.borrow_mut().push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.borrow().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.sql.clone()).collect()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecError> {
        self.calls.borrow_mut().push(Recorded {
            sql: query.to_string(),
            params: params.iter().map(|p| format!("{:?}", p)).collect(),
        });
        match self.script.borrow_mut().pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(ExecError::Other(message)),
            // Unscripted statements succeed and touch one row.
            None => Ok(1),
        }
    }

    fn query_one(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Row, ExecError> {
        Err(ExecError::Other(format!("query_one not scripted: {}", query)))
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecError> {
        Err(ExecError::Other(format!("query_all not scripted: {}", query)))
    }
}
