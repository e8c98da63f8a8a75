//! Process configuration for store selection and logging.
//!
//! # Responsibility
//! - Parse TOML configuration into typed settings.
//! - Resolve the store backend into one concrete `StoreLocation`.
//!
//! # Invariants
//! - Missing sections fall back to defaults: in-memory store, no file logs.
//! - The `sqlite` backend always resolves to an explicit database path.
//!
//! Example:
//! ```toml
//! [store]
//! backend = "sqlite"
//! path = "/var/lib/treeclosure/trees.sqlite3"
//!
//! [logging]
//! level = "info"
//! dir = "/var/log/treeclosure"
//! ```

use crate::db::StoreLocation;
use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Errors from loading or resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config text is not valid TOML for this schema.
    Parse(toml::de::Error),
    /// `sqlite` backend selected without a database path.
    MissingDbPath,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::MissingDbPath => write!(f, "store backend `sqlite` requires `store.path`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::MissingDbPath => None,
        }
    }
}

/// Store adapter choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// File-backed SQLite database.
    Sqlite,
    /// Private in-memory SQLite database.
    #[default]
    Memory,
}

/// Store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file; required for `sqlite`.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolves these settings into a concrete location.
    pub fn location(&self) -> Result<StoreLocation, ConfigError> {
        match self.backend {
            StoreBackend::Memory => Ok(StoreLocation::Memory),
            StoreBackend::Sqlite => self
                .path
                .clone()
                .map(StoreLocation::File)
                .ok_or(ConfigError::MissingDbPath),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub level: Option<String>,
    /// Absolute directory for rolling log files; file logging is off when unset.
    pub dir: Option<PathBuf>,
}

impl LoggingConfig {
    /// Returns the configured level or the build-mode default.
    pub fn effective_level(&self) -> &str {
        self.level.as_deref().unwrap_or(default_log_level())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    /// Reads and parses one TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
