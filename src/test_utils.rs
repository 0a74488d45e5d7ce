/// # Test Utilities Module
///
/// Scripted in-memory driver used by unit tests to exercise reconnects,
/// retry budgets and statement failures without a database server.
///
/// This module provides:
/// - `FakeConnector`: refuses a configurable number of connection attempts
/// - `FakeServer`: shared state recording every call the connections make
/// - `RecordingSleeper`: retry sleeper that records instead of sleeping
use crate::core::db::connection::ConnectionConfig;
use crate::core::db::driver::{Connector, DriverConnection};
use crate::core::db::retry::Sleeper;
use crate::core::db::value::{Row, Value};
use crate::core::{DbError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Everything the fake connections did, plus knobs for failures.
#[derive(Debug, Default)]
pub struct FakeServer {
    /// Remaining connection attempts to refuse
    pub refusals: u32,
    pub connect_attempts: u32,
    pub closed: u32,
    pub pings: u32,
    /// Remaining pings to fail
    pub ping_failures: u32,
    /// Statements containing this text fail
    pub fail_on: Option<String>,
    /// Streams fail after yielding this many rows
    pub fail_stream_after: Option<usize>,
    /// Rows returned by every query
    pub rows: Vec<Row>,
    pub executed: Vec<(String, Vec<Value>)>,
    pub batches: Vec<(String, Vec<Vec<Value>>)>,
    /// Rows handed to stream sinks
    pub streamed: usize,
    pub commits: u32,
    pub rollbacks: u32,
}

#[derive(Debug, Default, Clone)]
pub struct FakeConnector {
    server: Arc<Mutex<FakeServer>>,
}

impl FakeConnector {
    /// Connector whose first `refusals` attempts fail.
    pub fn refusing(refusals: u32) -> Self {
        let connector = FakeConnector::default();
        connector.server().refusals = refusals;
        connector
    }

    /// Connector serving `count` rows of `(id, name)`.
    pub fn with_rows(count: i64) -> Self {
        let connector = FakeConnector::default();
        connector.server().rows = sample_rows(count);
        connector
    }

    pub fn server(&self) -> MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>> {
        let mut server = self.server();
        server.connect_attempts += 1;
        if server.refusals > 0 {
            server.refusals -= 1;
            return Err(DbError::Driver("connection refused".to_string()));
        }
        Ok(Box::new(FakeConnection {
            server: Arc::clone(&self.server),
        }))
    }
}

pub struct FakeConnection {
    server: Arc<Mutex<FakeServer>>,
}

impl FakeConnection {
    fn server(&self) -> MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, sql: &str, params: &[Value]) -> Result<()> {
        let mut server = self.server();
        server.executed.push((sql.to_string(), params.to_vec()));
        match &server.fail_on {
            Some(needle) if sql.contains(needle.as_str()) => {
                Err(DbError::Driver(format!("statement rejected: {sql}")))
            }
            _ => Ok(()),
        }
    }
}

impl DriverConnection for FakeConnection {
    fn ping(&mut self) -> Result<()> {
        let mut server = self.server();
        server.pings += 1;
        if server.ping_failures > 0 {
            server.ping_failures -= 1;
            return Err(DbError::Driver("server has gone away".to_string()));
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params)?;
        Ok(1)
    }

    fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        Ok(self.server().rows.clone())
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<()> {
        self.record(sql, &[])?;
        self.server().batches.push((sql.to_string(), rows.to_vec()));
        Ok(())
    }

    fn stream_rows(
        &mut self,
        sql: &str,
        params: &[Value],
        sink: &mut dyn FnMut(Row) -> bool,
    ) -> Result<()> {
        self.record(sql, params)?;
        let (rows, fail_after) = {
            let server = self.server();
            (server.rows.clone(), server.fail_stream_after)
        };
        for (i, row) in rows.into_iter().enumerate() {
            if fail_after == Some(i) {
                return Err(DbError::Driver("lost connection during query".to_string()));
            }
            self.server().streamed += 1;
            if !sink(row) {
                break;
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.server().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.server().rollbacks += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.server().closed += 1;
        Ok(())
    }
}

/// Retry sleeper that only records the requested delays.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn naps(&self) -> Vec<Duration> {
        self.naps.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut naps) = self.naps.lock() {
            naps.push(duration);
        }
    }
}

/// Rows `(id, name)` with ids `1..=count` and names `name-<id>`.
pub fn sample_rows(count: i64) -> Vec<Row> {
    let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
    (1..=count)
        .map(|id| Row::new(Arc::clone(&columns), vec![Value::Int(id), Value::Text(format!("name-{id}"))]))
        .collect()
}
