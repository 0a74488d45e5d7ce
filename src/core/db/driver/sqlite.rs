/// SQLite driver backed by rusqlite.
///
/// `ConnectionConfig::database` is the path of the database file. Host,
/// port and credentials are ignored.
use crate::core::db::connection::ConnectionConfig;
use crate::core::db::driver::{Connector, DriverConnection};
use crate::core::db::value::{Row, Value};
use crate::core::Result;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Statement};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>> {
        let path = config.database.as_deref().unwrap_or(":memory:");
        debug!("Opening SQLite database at {}", path);
        let conn = Connection::open(path)?;

        // Initialize connection with common pragmas
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Box::new(SqliteConnection { conn }))
    }
}

pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    fn column_names(stmt: &Statement<'_>) -> Arc<[String]> {
        stmt.column_names().into_iter().map(String::from).collect()
    }
}

impl DriverConnection for SqliteConnection {
    fn ping(&mut self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        // Stepped through a query so statements returning rows
        // (`RETURNING`, most pragmas) are accepted too.
        {
            let mut stmt = self.conn.prepare(sql)?;
            let mut rows = stmt.query(params_from_iter(params.iter().map(to_sqlite)))?;
            while rows.next()?.is_some() {}
        }
        Ok(self.conn.changes())
    }

    fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        self.stream_rows(sql, params, &mut |row| {
            rows.push(row);
            true
        })?;
        Ok(rows)
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(sql)?;
            for params in rows {
                stmt.execute(params_from_iter(params.iter().map(to_sqlite)))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn stream_rows(
        &mut self,
        sql: &str,
        params: &[Value],
        sink: &mut dyn FnMut(Row) -> bool,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns = Self::column_names(&stmt);
        let column_count = columns.len();

        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sqlite)))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(from_sqlite(row.get_ref(i)?));
            }
            if !sink(Row::new(Arc::clone(&columns), values)) {
                break;
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(v) => SqliteValue::Integer(i64::from(*v)),
        Value::Int(v) => SqliteValue::Integer(*v),
        Value::UInt(v) => i64::try_from(*v)
            .map(SqliteValue::Integer)
            .unwrap_or_else(|_| SqliteValue::Text(v.to_string())),
        Value::Float(v) => SqliteValue::Real(*v),
        Value::Text(v) => SqliteValue::Text(v.clone()),
        Value::Bytes(v) => SqliteValue::Blob(v.clone()),
        Value::DateTime(v) => SqliteValue::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(t.to_vec()),
        },
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}
