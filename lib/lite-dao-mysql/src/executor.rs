//! MySQL implementation of StatementExecutor.

const DEFAULT_MAX_CONNECTIONS: u32 = 16;

use std::sync::Arc;

use lite_dao::{DaoError, Row, StatementExecutor, Value};
use sqlx::mysql::MySqlPoolOptions;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::bind::{bind_all, convert_row};

/// Connection configuration for the MySQL executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub url: String,
    pub max_connections: u32,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::new(url)
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::new(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::new(url.clone())
    }
}

/// Synchronous executor over an sqlx MySQL pool.
///
/// Statements run on a private tokio runtime; calling into the executor from inside
/// another tokio runtime is not supported.
#[derive(Clone, Debug)]
pub struct MySqlExecutor {
    pool: sqlx::MySqlPool,
    runtime: Arc<Runtime>,
}

impl MySqlExecutor {
    /// Connect to a MySQL database.
    pub fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, DaoError> {
        let config = config.into();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| DaoError::Executor(e.to_string()))?;

        let pool = runtime
            .block_on(
                MySqlPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url),
            )
            .map_err(|e| DaoError::Executor(e.to_string()))?;

        debug!(max_connections = config.max_connections, "mysql pool connected");
        Ok(Self {
            pool,
            runtime: Arc::new(runtime),
        })
    }

    /// Wrap an existing pool driven by `runtime`.
    pub fn new(pool: sqlx::MySqlPool, runtime: Arc<Runtime>) -> Self {
        Self { pool, runtime }
    }

    /// Get the inner sqlx::MySqlPool.
    pub fn inner(&self) -> &sqlx::MySqlPool {
        &self.pool
    }
}

impl StatementExecutor for MySqlExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DaoError> {
        let args = bind_all(params)?;
        let result = self
            .runtime
            .block_on(sqlx::query_with(sql, args).execute(&self.pool))
            .map_err(|e| DaoError::Executor(e.to_string()))?;
        Ok(result.rows_affected())
    }

    fn insert_returning_key(&self, sql: &str, params: &[Value]) -> Result<Value, DaoError> {
        let args = bind_all(params)?;
        let result = self
            .runtime
            .block_on(sqlx::query_with(sql, args).execute(&self.pool))
            .map_err(|e| DaoError::Executor(e.to_string()))?;
        Ok(Value::UInt(result.last_insert_id()))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DaoError> {
        let args = bind_all(params)?;
        let rows = self
            .runtime
            .block_on(sqlx::query_with(sql, args).fetch_all(&self.pool))
            .map_err(|e| DaoError::Executor(e.to_string()))?;

        rows.iter().map(convert_row).collect()
    }
}
