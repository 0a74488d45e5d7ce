/// Error Module
///
/// This module defines the error types shared by the connection layer, the
/// query executor and the SQL builders. Driver failures, exhausted retry
/// budgets and builder misuse are kept apart so callers can tell a broken
/// server from a broken call site.
use thiserror::Error;

/// Error type for every fallible operation in the crate.
///
/// The variants fall into three groups:
/// - Driver failures raised while a statement runs (`Mysql`, `Sqlite`, `Driver`)
/// - Connection establishment giving up after the retry budget (`Connection`)
/// - Misuse detected before any network traffic (`Build`, `Config`)
#[derive(Error, Debug)]
pub enum DbError {
    /// Errors reported by the MySQL driver
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql::Error),

    /// Errors reported by the SQLite driver
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The connection could not be established within the retry budget
    #[error("Connection error: {0}")]
    Connection(String),

    /// Generic driver failure that has no dedicated variant
    #[error("Driver error: {0}")]
    Driver(String),

    /// A builder was called with arguments it cannot turn into SQL
    #[error("Invalid statement: {0}")]
    Build(#[from] BuildError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Argument validation failures raised synchronously by the SQL builders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("table name must not be empty")]
    EmptyTable,

    #[error("{0} needs at least one column value")]
    EmptyValues(&'static str),

    #[error("{0} needs at least one condition")]
    EmptyCondition(&'static str),

    #[error("column `{0}` is used both as a key and as a data column")]
    OverlappingColumns(String),

    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),

    #[error("batch size must be greater than zero")]
    ZeroBatch,

    #[error("select column `{0}` must not contain a placeholder")]
    PlaceholderInColumn(String),
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
