/// Database Module
///
/// This module provides the self-healing client and the layers it is built
/// from, organized into focused submodules.
///
/// ## Architecture
///
/// - **Drivers** (`driver.rs`): the capability traits and the MySQL/SQLite implementations
/// - **Connection Management** (`connection.rs`): one live connection, liveness probe and reconnect
/// - **Retry** (`retry.rs`): attempt budget and backoff between connection attempts
/// - **Query Execution** (`query.rs`): buffered reads, writes and batch inserts
/// - **Streaming** (`stream.rs`): lazy rows from a server-side cursor
/// - **Keyset Pagination** (`keyset.rs`): whole-table walks in key order
/// - **Client** (`client.rs`): the handle tying the above together
///
/// ## Error Handling
///
/// All operations return the crate-wide `DbError`. Write paths always
/// propagate failures; the `query`/`first` read helpers log them and return
/// `None`.
pub mod client;
pub mod connection;
pub mod driver;
pub mod keyset;
pub mod query;
pub mod retry;
pub mod stream;
pub mod value;

pub use client::Client;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use driver::{Connector, DriverConnection};
pub use keyset::KeysetIter;
pub use query::QueryExecutor;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper, DEFAULT_RETRY_INTERVAL};
pub use stream::StreamingCursor;
pub use value::{Row, Value};
