/// Reconnect policy for the connection manager.
///
/// The sleep between attempts goes through a [`Sleeper`] so retry behaviour
/// can be exercised without real delays.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay between two connection attempts unless configured otherwise.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Blocks the calling thread between connection attempts.
pub trait Sleeper: Send + Sync + fmt::Debug {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounded or unbounded retry with a fixed interval.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            interval: DEFAULT_RETRY_INTERVAL,
            sleeper: Arc::new(ThreadSleeper),
        }
    }
}

impl RetryPolicy {
    /// Policy giving up after `max_attempts` failed attempts. Zero retries forever.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that keeps retrying until a connection is established.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Set the fixed delay between attempts.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replace the sleeper used between attempts.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_interval(&self) -> Duration {
        self.interval
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    /// Whether another attempt may follow `attempts` failed ones.
    pub fn allows_another(&self, attempts: u32) -> bool {
        self.is_unbounded() || attempts < self.max_attempts
    }

    /// Waits out the interval before the next attempt.
    pub fn wait(&self) {
        self.sleeper.sleep(self.interval);
    }
}
