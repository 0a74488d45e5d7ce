/// Driver Capability Module
///
/// The connection manager and the executor only talk to the database through
/// these two traits. A `Connector` opens connections from a descriptor and a
/// `DriverConnection` runs statements on one live connection.
///
/// ## Drivers
///
/// - `mysql` feature: blocking MySQL driver (`MysqlConnector`)
/// - `sqlite` feature: SQLite files, mainly for local use and tests (`SqliteConnector`)
use crate::core::db::connection::ConnectionConfig;
use crate::core::db::value::{Row, Value};
use crate::core::Result;
use std::fmt;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use self::mysql::MysqlConnector;
#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteConnector;

/// Opens new connections. Shared by every clone of a client.
pub trait Connector: Send + Sync + fmt::Debug {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>>;
}

/// One live connection to the server.
///
/// Statements use `?` positional placeholders; `params` must match them in
/// number and order.
pub trait DriverConnection: Send {
    /// Lightweight round trip confirming the connection is usable.
    fn ping(&mut self) -> Result<()>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Runs a query on a buffered cursor and returns every row.
    fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Runs a query and returns its first row.
    fn fetch_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.fetch_all(sql, params)?.into_iter().next())
    }

    /// Runs one statement once per parameter set, in as few round trips as
    /// the driver allows.
    fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<()>;

    /// Runs a query on an unbuffered server-side cursor and hands rows to
    /// `sink` one at a time. Returning `false` from `sink` stops the cursor.
    fn stream_rows(
        &mut self,
        sql: &str,
        params: &[Value],
        sink: &mut dyn FnMut(Row) -> bool,
    ) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    /// Discards the work of a failed statement or batch.
    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    /// Releases the connection.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
