//! Subscriber setup for the binary.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the application. Events go to stderr so stdout stays free for
//! command output, and optionally to a daily-rotated file.

use crate::config::LogConfig;
use crate::core::{DbError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. When a log directory is
/// configured the returned guard must be kept alive for the lifetime of the
/// program, otherwise buffered file output is lost.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| DbError::Config(format!("invalid log level {:?}: {}", config.level, e)))?,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| DbError::Config(format!("logging already initialised: {}", e)))?;

    tracing::debug!(level = %config.level, directory = ?config.directory, "logging initialised");
    Ok(guard)
}
