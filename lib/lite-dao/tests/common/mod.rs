#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result
)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lite_dao::{DaoError, Row, StatementExecutor, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    Execute,
    InsertReturningKey,
    Query,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Executor that records every statement and answers queries from a queue.
pub struct RecordingExecutor {
    calls: Mutex<Vec<Call>>,
    results: Mutex<VecDeque<Vec<Row>>>,
    next_key: AtomicU64,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            next_key: AtomicU64::new(100),
        }
    }

    /// Rows returned by the next query.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.results.lock().unwrap().push_back(rows);
    }

    /// A single-row, single-column result for the next query.
    pub fn push_scalar(&self, column: &str, value: impl Into<Value>) {
        self.push_rows(vec![Row::new().with(column, value)]);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Call {
        self.calls.lock().unwrap().last().cloned().unwrap()
    }

    fn record(&self, kind: CallKind, sql: &str, params: &[Value]) {
        self.calls.lock().unwrap().push(Call {
            kind,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

impl StatementExecutor for RecordingExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError> {
        self.record(CallKind::Execute, sql, params);
        Ok(1)
    }

    fn insert_returning_key(&self, sql: &str, params: &[Value]) -> Result<Value, DaoError> {
        self.record(CallKind::InsertReturningKey, sql, params);
        Ok(Value::UInt(self.next_key.fetch_add(1, Ordering::SeqCst)))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DaoError> {
        self.record(CallKind::Query, sql, params);
        Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
    }
}
