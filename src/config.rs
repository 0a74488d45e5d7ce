use crate::core::db::connection::ConnectionConfig;
use crate::core::db::driver::Connector;
use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Nested `include` lists deeper than this are treated as a cycle.
const MAX_INCLUDE_DEPTH: usize = 8;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

/// Which driver the `[database]` section talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Mysql,
    Sqlite,
}

/// Database-related configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: DriverKind,
    #[serde(flatten)]
    pub connection: ConnectionConfig,
}

impl DatabaseConfig {
    /// Connector for the configured driver.
    ///
    /// # Errors
    ///
    /// `DbError::Config` if the driver was compiled out.
    pub fn connector(&self) -> Result<Arc<dyn Connector>> {
        match self.driver {
            #[cfg(feature = "mysql")]
            DriverKind::Mysql => Ok(Arc::new(crate::core::db::driver::MysqlConnector)),
            #[cfg(feature = "sqlite")]
            DriverKind::Sqlite => Ok(Arc::new(crate::core::db::driver::SqliteConnector)),
            #[allow(unreachable_patterns)]
            other => Err(DbError::Config(format!("driver {:?} is not enabled in this build", other))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Write a daily-rotated log file here in addition to stderr
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "mysql-tool.log".to_string(),
        }
    }
}

/// `<config dir>/mysql-tool/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mysql-tool").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// A top-level `include = ["common.toml"]` list pulls in other files,
/// resolved relative to the including file. Included files are merged in
/// order and the including file wins on conflicts.
///
/// # Example
///
/// ```no_run
/// let config = mysql_tool::config::load_config("config.toml")?;
/// println!("{:?}", config);
/// # Ok::<(), mysql_tool::DbError>(())
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let value = load_value(path.as_ref(), 0)?;
    Ok(value.try_into::<Config>()?)
}

fn load_value(path: &Path, depth: usize) -> Result<toml::Value> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(DbError::Config(format!(
            "includes nested too deeply at {}",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| DbError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let mut value: toml::Value = toml::from_str(&content)?;

    let includes = match value.as_table_mut().and_then(|t| t.remove("include")) {
        Some(toml::Value::Array(items)) => items,
        Some(other) => {
            return Err(DbError::Config(format!(
                "`include` in {} must be an array of paths, found {}",
                path.display(),
                other.type_str()
            )))
        }
        None => Vec::new(),
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut merged = toml::Value::Table(toml::value::Table::new());
    for item in includes {
        let name = item.as_str().ok_or_else(|| {
            DbError::Config(format!("`include` entries in {} must be strings", path.display()))
        })?;
        merge(&mut merged, load_value(&base_dir.join(name), depth + 1)?);
    }
    merge(&mut merged, value);
    Ok(merged)
}

fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
