/// Streaming Query Module
///
/// Lazy, forward-only iteration over result sets too large to buffer.
///
/// While a [`StreamingCursor`] is open its connection is checked out of the
/// manager and driven by a worker thread that reads an unbuffered
/// server-side cursor. Rows cross a bounded channel, so only a handful are
/// in memory at any time and the worker blocks until the consumer asks for
/// more. Closing or dropping the cursor stops the worker and hands the
/// connection back.
use crate::core::db::connection::ConnectionManager;
use crate::core::db::driver::DriverConnection;
use crate::core::db::value::{Row, Value};
use crate::core::{DbError, Result};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Rows buffered between the worker and the consumer.
const STREAM_BUFFER_ROWS: usize = 32;

/// A lazy row sequence over a server-side cursor.
///
/// The cursor is closed on every exit path: exhaustion, an error, an
/// explicit [`close`](StreamingCursor::close) or drop. The connection is
/// committed only when the rows ran out without error.
pub struct StreamingCursor<'a> {
    manager: &'a mut ConnectionManager,
    rows: Option<Receiver<Result<Row>>>,
    worker: Option<JoinHandle<Box<dyn DriverConnection>>>,
    peeked: Option<Result<Row>>,
    sql: String,
    params: Vec<Value>,
    finished: bool,
}

impl<'a> StreamingCursor<'a> {
    pub(crate) fn open(manager: &'a mut ConnectionManager, sql: &str, params: &[Value]) -> Result<Self> {
        manager.ensure_connected()?;
        let mut conn = manager
            .take_connection()
            .ok_or_else(|| DbError::Connection("connection vanished before streaming".to_string()))?;
        debug!(params = ?params, "iter_query: {}", sql);

        let (tx, rx) = mpsc::sync_channel::<Result<Row>>(STREAM_BUFFER_ROWS);
        let worker_sql = sql.to_string();
        let worker_params = params.to_vec();
        let spawned = thread::Builder::new()
            .name("iter-query".to_string())
            .spawn(move || {
                // A failed send means the consumer hung up.
                let outcome = conn.stream_rows(&worker_sql, &worker_params, &mut |row| tx.send(Ok(row)).is_ok());
                if let Err(e) = outcome {
                    let _ = tx.send(Err(e));
                }
                conn
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                manager.mark_lost();
                return Err(DbError::Io(e));
            }
        };

        Ok(StreamingCursor {
            manager,
            rows: Some(rx),
            worker: Some(worker),
            peeked: None,
            sql: sql.to_string(),
            params: params.to_vec(),
            finished: false,
        })
    }

    /// Whether another item (row or error) is available. Blocks until the
    /// worker produces one or the cursor is exhausted.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.pull();
        }
        self.peeked.is_some()
    }

    /// Returns the next row, the error that ended the stream, or `None` once
    /// the cursor is exhausted.
    pub fn next_row(&mut self) -> Option<Result<Row>> {
        match self.peeked.take() {
            Some(item) => Some(item),
            None => self.pull(),
        }
    }

    /// Stops the stream early and returns the connection to the manager
    /// without committing.
    pub fn close(mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finish(false)
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.peeked.is_none()
    }

    fn pull(&mut self) -> Option<Result<Row>> {
        if self.finished {
            return None;
        }
        let received = self.rows.as_ref()?.recv();
        match received {
            Ok(Ok(row)) => Some(Ok(row)),
            Ok(Err(e)) => {
                error!(sql = %self.sql, params = ?self.params, "iter_query failed: {}", e);
                if let Err(cleanup) = self.finish(false) {
                    error!("iter_query cleanup failed: {}", cleanup);
                }
                Some(Err(e))
            }
            // The worker hung up: every row has been delivered.
            Err(_) => self.finish(true).err().map(Err),
        }
    }

    fn finish(&mut self, completed: bool) -> Result<()> {
        self.finished = true;
        self.rows = None;

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        match worker.join() {
            Ok(mut conn) => {
                let committed = if completed { conn.commit() } else { Ok(()) };
                self.manager.restore_connection(conn);
                if let Err(e) = &committed {
                    error!(sql = %self.sql, "commit after iter_query failed: {}", e);
                }
                committed
            }
            Err(_) => {
                self.manager.mark_lost();
                Err(DbError::Driver("streaming worker panicked; connection dropped".to_string()))
            }
        }
    }
}

impl Iterator for StreamingCursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

impl Drop for StreamingCursor<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finish(false) {
                error!("closing iter_query cursor failed: {}", e);
            }
        }
    }
}
