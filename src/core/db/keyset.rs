/// Keyset Pagination Module
///
/// Walks a whole table in key order one bounded page at a time, resuming
/// each page strictly after the last key seen. Unlike a streaming cursor
/// this never holds a server-side cursor open between pages, so other
/// statements may run on the same client while iterating.
use crate::core::db::connection::ConnectionManager;
use crate::core::db::query::QueryExecutor;
use crate::core::db::value::{Row, Value};
use crate::core::{DbError, Result};
use crate::sql;
use std::vec::IntoIter;
use tracing::debug;

/// Rows of a table in ascending key order, fetched `batch` at a time.
///
/// Yields `Err` once and then stops if a page fails to load.
pub struct KeysetIter<'a> {
    manager: &'a mut ConnectionManager,
    table: String,
    key: String,
    batch: usize,
    last_key: Option<Value>,
    page: IntoIter<Row>,
    exhausted: bool,
}

impl<'a> KeysetIter<'a> {
    /// # Errors
    ///
    /// `DbError::Build` if the table or key is blank or `batch` is zero.
    pub fn new(manager: &'a mut ConnectionManager, table: &str, key: &str, batch: usize) -> Result<Self> {
        // Validate once up front so page loads only fail on the server side.
        sql::keyset_page(table, key, None, batch)?;
        Ok(KeysetIter {
            manager,
            table: table.to_string(),
            key: key.trim().to_string(),
            batch,
            last_key: None,
            page: Vec::new().into_iter(),
            exhausted: false,
        })
    }

    /// Last key yielded so far.
    pub fn last_key(&self) -> Option<&Value> {
        self.last_key.as_ref()
    }

    fn load_page(&mut self) -> Result<()> {
        let stmt = sql::keyset_page(&self.table, &self.key, self.last_key.as_ref(), self.batch)?;
        let rows = QueryExecutor::new(&mut *self.manager).fetch_all(stmt.sql(), stmt.params())?;
        debug!(table = %self.table, after = ?self.last_key, "loaded {} rows", rows.len());

        // A short page is the last one.
        if rows.len() < self.batch {
            self.exhausted = true;
        }
        self.page = rows.into_iter();
        Ok(())
    }
}

impl Iterator for KeysetIter<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(row) = self.page.next() {
            return Some(self.advance(row));
        }
        if self.exhausted {
            return None;
        }
        if let Err(e) = self.load_page() {
            self.exhausted = true;
            return Some(Err(e));
        }
        let row = self.page.next()?;
        Some(self.advance(row))
    }
}

impl KeysetIter<'_> {
    fn advance(&mut self, row: Row) -> Result<Row> {
        match row.get(&self.key) {
            Some(key) => {
                self.last_key = Some(key.clone());
                Ok(row)
            }
            None => {
                self.exhausted = true;
                self.page = Vec::new().into_iter();
                Err(DbError::Driver(format!(
                    "key column `{}` missing from rows of `{}`",
                    self.key, self.table
                )))
            }
        }
    }
}
