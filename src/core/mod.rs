/// Core Module
///
/// This module contains the database access layer: connection management,
/// query execution, streaming and the value/row model shared with the SQL
/// builders.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{BuildError, DbError, Result};
