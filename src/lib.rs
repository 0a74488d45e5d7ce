// Core infrastructure modules
pub mod core;

// Application support
pub mod config;
pub mod logging;
pub mod sql;

#[cfg(test)]
pub mod test_utils;

pub use crate::core::db::{
    Client, ConnectionConfig, ConnectionManager, ConnectionState, Connector, DriverConnection, KeysetIter,
    QueryExecutor, RetryPolicy, Row, Sleeper, StreamingCursor, Value,
};
pub use crate::core::{BuildError, DbError, Result};
pub use crate::sql::{ColumnValues, Statement, StatementBuilder};
