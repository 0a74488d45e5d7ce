/// Client Module
///
/// [`Client`] is the handle most callers hold: one descriptor, one live
/// connection, and the buffered and streaming operations of the executor.

use crate::core::db::connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use crate::core::db::driver::Connector;
use crate::core::db::keyset::KeysetIter;
use crate::core::db::query::QueryExecutor;
use crate::core::db::retry::RetryPolicy;
use crate::core::db::stream::StreamingCursor;
use crate::core::db::value::{Row, Value};
use crate::core::Result;
use crate::sql::Statement;
use std::sync::Arc;

/// A self-healing database client.
///
/// Connects eagerly on construction and reconnects transparently before any
/// operation whose connection fails the liveness probe.
///
/// # Examples
///
/// ```no_run
/// use mysql_tool::{sql, Client, ColumnValues, ConnectionConfig};
///
/// let config = ConnectionConfig::new("localhost", 3306)
///     .user("dever")
///     .password("dever")
///     .database("user")
///     .max_retry(3);
/// let mut client = Client::mysql(config)?;
///
/// let stmt = sql::insert("industry", &ColumnValues::new().with("industry_name", "retail"))?;
/// client.run(&stmt)?;
/// let row = client.first("SELECT * FROM industry WHERE industry_name = ?", &["retail".into()]);
/// # Ok::<(), mysql_tool::DbError>(())
/// ```
#[derive(Debug)]
pub struct Client {
    manager: ConnectionManager,
}

impl Client {
    /// Connects with the retry policy described by `config`.
    pub fn connect(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let retry = config.retry_policy();
        Self::with_retry_policy(config, connector, retry)
    }

    /// Connects with an explicit retry policy.
    pub fn with_retry_policy(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let mut manager = ConnectionManager::new(config, connector).with_retry_policy(retry);
        manager.ensure_connected()?;
        Ok(Client { manager })
    }

    #[cfg(feature = "mysql")]
    pub fn mysql(config: ConnectionConfig) -> Result<Self> {
        Self::connect(config, Arc::new(crate::core::db::driver::MysqlConnector))
    }

    /// Opens the SQLite file at `path`.
    #[cfg(feature = "sqlite")]
    pub fn sqlite(path: impl Into<String>) -> Result<Self> {
        let config = ConnectionConfig::default().database(path).max_retry(1);
        Self::connect(config, Arc::new(crate::core::db::driver::SqliteConnector))
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.manager.config()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn manager(&mut self) -> &mut ConnectionManager {
        &mut self.manager
    }

    fn executor(&mut self) -> QueryExecutor<'_> {
        QueryExecutor::new(&mut self.manager)
    }

    /// Executes and commits a write; see [`QueryExecutor::execute`].
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.executor().execute(sql, params)
    }

    /// Executes a built statement.
    pub fn run(&mut self, statement: &Statement) -> Result<u64> {
        self.execute(statement.sql(), statement.params())
    }

    /// All rows, or `None` if the query failed.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Option<Vec<Row>> {
        self.executor().query(sql, params)
    }

    /// First row, or `None` if there is none or the query failed.
    pub fn first(&mut self, sql: &str, params: &[Value]) -> Option<Row> {
        self.executor().first(sql, params)
    }

    /// All rows, propagating failures.
    pub fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.executor().fetch_all(sql, params)
    }

    /// First row, propagating failures.
    pub fn fetch_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        self.executor().fetch_one(sql, params)
    }

    /// Batch insert committed once; see [`QueryExecutor::insert_many`].
    pub fn insert_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<()> {
        self.executor().insert_many(sql, rows)
    }

    /// Lazy row sequence on a server-side cursor.
    pub fn iter_query(&mut self, sql: &str, params: &[Value]) -> Result<StreamingCursor<'_>> {
        self.executor().iter_query(sql, params)
    }

    /// Walks `table` in `key` order, `batch` rows per round trip.
    pub fn iter_by_key(&mut self, table: &str, key: &str, batch: usize) -> Result<KeysetIter<'_>> {
        KeysetIter::new(&mut self.manager, table, key, batch)
    }

    /// A new client with its own connection and the same descriptor, for
    /// handing to another worker.
    pub fn try_clone(&self) -> Result<Client> {
        Ok(Client {
            manager: self.manager.try_clone()?,
        })
    }

    /// Releases the connection. Safe to call repeatedly; the next operation
    /// reconnects.
    pub fn close(&mut self) {
        self.manager.close();
    }
}
