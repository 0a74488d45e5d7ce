/// Query Execution Module
///
/// Buffered statement execution on top of [`ConnectionManager`]. Every
/// operation first makes sure the connection is alive, and writes are
/// committed before returning. A failed write is rolled back, so a batch
/// never leaves part of its rows behind.
///
/// Writes and reads fail differently: `execute` and `insert_many` log and
/// return the driver error, while `query` and `first` log it and return
/// `None` so read-only call sites can treat "no data" and "error" alike.

use crate::core::db::connection::ConnectionManager;
use crate::core::db::stream::StreamingCursor;
use crate::core::db::value::{Row, Value};
use crate::core::Result;
use tracing::{debug, error};

/// Query execution service that operates on a managed connection
pub struct QueryExecutor<'a> {
    manager: &'a mut ConnectionManager,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection manager
    pub fn new(manager: &'a mut ConnectionManager) -> Self {
        QueryExecutor { manager }
    }

    /// Executes a statement and commits it.
    ///
    /// # Returns
    ///
    /// The number of affected rows.
    ///
    /// # Errors
    ///
    /// Connection failures, and any driver error raised by the statement or
    /// the commit. Statement failures are logged with the SQL text and
    /// parameters before being returned.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let conn = self.manager.ensure_connected()?;
        debug!(params = ?params, "execute: {}", sql);

        let outcome = conn.execute(sql, params).and_then(|affected| {
            conn.commit()?;
            Ok(affected)
        });
        if let Err(e) = &outcome {
            error!(sql = %sql, params = ?params, "execute failed: {}", e);
            if let Err(e) = conn.rollback() {
                error!("rollback after execute failed: {}", e);
            }
        }
        outcome
    }

    /// Runs a query and returns all rows, propagating errors.
    pub fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.manager.ensure_connected()?;
        debug!(params = ?params, "fetch_all: {}", sql);

        let rows = conn.fetch_all(sql, params)?;
        conn.commit()?;
        Ok(rows)
    }

    /// Runs a query and returns its first row, propagating errors.
    pub fn fetch_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let conn = self.manager.ensure_connected()?;
        debug!(params = ?params, "fetch_one: {}", sql);

        let row = conn.fetch_one(sql, params)?;
        conn.commit()?;
        Ok(row)
    }

    /// Runs a query and returns all rows, or `None` if anything failed.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Option<Vec<Row>> {
        match self.fetch_all(sql, params) {
            Ok(rows) => Some(rows),
            Err(e) => {
                error!(sql = %sql, params = ?params, "query failed: {}", e);
                None
            }
        }
    }

    /// Runs a query and returns its first row, or `None` if there is no row
    /// or anything failed.
    pub fn first(&mut self, sql: &str, params: &[Value]) -> Option<Row> {
        match self.fetch_one(sql, params) {
            Ok(row) => row,
            Err(e) => {
                error!(sql = %sql, params = ?params, "first failed: {}", e);
                None
            }
        }
    }

    /// Executes one statement for every parameter set and commits once.
    ///
    /// An empty batch touches nothing beyond the connection check.
    pub fn insert_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<()> {
        let conn = self.manager.ensure_connected()?;
        if rows.is_empty() {
            return Ok(());
        }
        debug!(rows = rows.len(), "insert_many: {}", sql);

        let outcome = conn.execute_batch(sql, rows).and_then(|()| conn.commit());
        if let Err(e) = &outcome {
            error!(sql = %sql, rows = rows.len(), "insert many error: {}", e);
            if let Err(e) = conn.rollback() {
                error!("rollback after insert many failed: {}", e);
            }
        }
        outcome
    }

    /// Opens a server-side cursor and returns a lazy row sequence.
    ///
    /// See [`StreamingCursor`] for cleanup and commit guarantees.
    pub fn iter_query(self, sql: &str, params: &[Value]) -> Result<StreamingCursor<'a>> {
        StreamingCursor::open(self.manager, sql, params)
    }
}
