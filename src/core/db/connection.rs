/// Connection Management Module
///
/// This module owns the single live connection of a client: it checks the
/// connection before each use, tears it down when the liveness probe fails
/// and reconnects under the configured [`RetryPolicy`].

use crate::core::db::driver::{Connector, DriverConnection};
use crate::core::db::retry::RetryPolicy;
use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Represents the lifecycle of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live connection
    #[default]
    Disconnected,
    /// A connection attempt is in progress
    Connecting,
    /// A live connection is held
    Connected,
}

/// Connection descriptor: where to connect and how hard to try.
///
/// Deserializes from the `[database]` section of the configuration file.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Schema name for MySQL, file path for SQLite
    pub database: Option<String>,
    pub charset: String,
    /// Connection attempts before giving up; 0 retries forever
    pub max_retry: u32,
    pub retry_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: None,
            password: None,
            database: None,
            charset: "utf8".to_string(),
            max_retry: 0,
            retry_interval_ms: 5_000,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("max_retry", &self.max_retry)
            .field("retry_interval_ms", &self.retry_interval_ms)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Retry policy described by `max_retry` and `retry_interval_ms`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retry).interval(Duration::from_millis(self.retry_interval_ms))
    }

    fn endpoint(&self) -> String {
        match &self.database {
            Some(db) => format!("{}:{}/{}", self.host, self.port, db),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

/// Owns one connection and keeps it alive.
///
/// Not meant for concurrent use: share it behind a lock or hand each worker
/// its own instance via [`ConnectionManager::try_clone`].
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    connection: Option<Box<dyn DriverConnection>>,
    state: ConnectionState,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("connector", &self.connector)
            .field("retry", &self.retry)
            .field("state", &self.state)
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager without connecting. The retry policy comes from the
    /// descriptor.
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let retry = config.retry_policy();
        ConnectionManager {
            config,
            connector,
            retry,
            connection: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Replaces the retry policy derived from the descriptor.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Checks if a live connection is currently held (without probing it)
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.connection.is_some()
    }

    /// Returns a usable connection, probing the current one and reconnecting
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` once a bounded retry policy runs out of
    /// attempts. With an unbounded policy this blocks until a connection is
    /// established.
    pub fn ensure_connected(&mut self) -> Result<&mut Box<dyn DriverConnection>> {
        let alive = match self.connection.as_mut() {
            Some(conn) => match conn.ping() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Liveness probe on {} failed: {}", self.config.endpoint(), e);
                    false
                }
            },
            None => false,
        };

        if !alive {
            self.close();
            self.connect_with_retry()?;
        }

        self.connection
            .as_mut()
            .ok_or_else(|| DbError::Connection(format!("no connection to {}", self.config.endpoint())))
    }

    fn connect_with_retry(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.connector.connect(&self.config) {
                Ok(conn) => {
                    if attempts > 1 {
                        info!("Connected to {} after {} attempts", self.config.endpoint(), attempts);
                    } else {
                        debug!("Connected to {}", self.config.endpoint());
                    }
                    self.connection = Some(conn);
                    self.state = ConnectionState::Connected;
                    return Ok(());
                }
                Err(e) => {
                    error!(attempt = attempts, "reconnect to {} failed: {}", self.config.endpoint(), e);
                    if !self.retry.allows_another(attempts) {
                        self.state = ConnectionState::Disconnected;
                        return Err(DbError::Connection(format!(
                            "gave up connecting to {} after {} attempts: {}",
                            self.config.endpoint(),
                            attempts,
                            e
                        )));
                    }
                    self.retry.wait();
                }
            }
        }
    }

    /// Opens an independent connection with the same descriptor and policy.
    pub fn try_clone(&self) -> Result<ConnectionManager> {
        let mut manager = ConnectionManager {
            config: self.config.clone(),
            connector: Arc::clone(&self.connector),
            retry: self.retry.clone(),
            connection: None,
            state: ConnectionState::Disconnected,
        };
        manager.ensure_connected()?;
        Ok(manager)
    }

    /// Releases the connection. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Err(e) = conn.close() {
                warn!("Error while closing connection to {}: {}", self.config.endpoint(), e);
            }
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Checks the connection out for a streaming worker.
    pub(crate) fn take_connection(&mut self) -> Option<Box<dyn DriverConnection>> {
        self.connection.take()
    }

    /// Returns a connection checked out with `take_connection`.
    pub(crate) fn restore_connection(&mut self, conn: Box<dyn DriverConnection>) {
        self.connection = Some(conn);
        self.state = ConnectionState::Connected;
    }

    /// Records that a checked-out connection will not come back.
    pub(crate) fn mark_lost(&mut self) {
        self.connection = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeConnector, RecordingSleeper};

    fn manager_with(connector: &FakeConnector, max_attempts: u32) -> (ConnectionManager, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retry = RetryPolicy::new(max_attempts)
            .interval(Duration::from_secs(5))
            .sleeper(sleeper.clone());
        let manager = ConnectionManager::new(ConnectionConfig::default(), Arc::new(connector.clone()))
            .with_retry_policy(retry);
        (manager, sleeper)
    }

    #[test]
    fn test_connects_lazily_and_reuses_live_connection() {
        let connector = FakeConnector::default();
        let (mut manager, _) = manager_with(&connector, 3);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.ensure_connected().unwrap();
        manager.ensure_connected().unwrap();

        assert!(manager.is_connected());
        assert_eq!(connector.server().connect_attempts, 1);
        assert_eq!(connector.server().pings, 1);
    }

    #[test]
    fn test_bounded_retry_gives_up_after_max_attempts() {
        let connector = FakeConnector::refusing(u32::MAX);
        let (mut manager, sleeper) = manager_with(&connector, 3);

        let err = manager.ensure_connected().err().expect("expected connection failure");
        match err {
            DbError::Connection(msg) => assert!(msg.contains("after 3 attempts")),
            other => panic!("Expected Connection error, got {other:?}"),
        }
        assert_eq!(connector.server().connect_attempts, 3);
        assert_eq!(sleeper.naps(), vec![Duration::from_secs(5); 2]);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_unbounded_retry_keeps_trying_until_success() {
        let connector = FakeConnector::refusing(7);
        let (mut manager, sleeper) = manager_with(&connector, 0);

        manager.ensure_connected().unwrap();

        assert_eq!(connector.server().connect_attempts, 8);
        assert_eq!(sleeper.naps().len(), 7);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_failed_probe_replaces_stale_connection() {
        let connector = FakeConnector::default();
        let (mut manager, _) = manager_with(&connector, 1);
        manager.ensure_connected().unwrap();

        connector.server().ping_failures = 1;
        manager.ensure_connected().unwrap();

        let server = connector.server();
        assert_eq!(server.connect_attempts, 2);
        assert_eq!(server.closed, 1);
        assert!(manager.is_connected());
    }

    #[test]
    fn test_close_is_idempotent() {
        let connector = FakeConnector::default();
        let (mut manager, _) = manager_with(&connector, 1);
        manager.ensure_connected().unwrap();

        manager.close();
        manager.close();
        drop(manager);

        assert_eq!(connector.server().closed, 1);
    }

    #[test]
    fn test_try_clone_opens_independent_connection() {
        let connector = FakeConnector::default();
        let (mut manager, _) = manager_with(&connector, 2);
        manager.ensure_connected().unwrap();

        let clone = manager.try_clone().unwrap();
        assert!(clone.is_connected());
        assert_eq!(clone.config(), manager.config());
        assert_eq!(clone.retry_policy().max_attempts(), 2);
        assert_eq!(connector.server().connect_attempts, 2);
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ConnectionConfig::new("db.internal", 3307)
            .user("app")
            .password("s3cret")
            .database("shop")
            .max_retry(4);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("***"));
        assert_eq!(config.retry_policy().max_attempts(), 4);
    }
}
