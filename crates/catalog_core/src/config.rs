//! Run configuration read from environment variables.
//!
//! # Invariants
//! - The collection name is fixed to [`COLLECTION_NAME`].
//! - A file endpoint is a directory; the database file is `<endpoint>/<database>.sqlite3`.

use crate::logging::{default_log_level, normalize_level};
use config::Environment;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const COLLECTION_NAME: &str = "books";
/// Endpoint value selecting a private in-memory database.
pub const MEMORY_ENDPOINT: &str = ":memory:";

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "CATALOG";
pub const ENDPOINT_VAR: &str = "CATALOG_ENDPOINT";
pub const DATABASE_VAR: &str = "CATALOG_DATABASE";
pub const LOG_LEVEL_VAR: &str = "CATALOG_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "CATALOG_LOG_DIR";

const DEFAULT_ENDPOINT: &str = ".";
const DEFAULT_DATABASE: &str = "library";
const DATABASE_FILE_EXTENSION: &str = "sqlite3";

static DATABASE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid database name regex"));

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    /// Environment source could not be read or deserialized.
    Source(config::ConfigError),
    EmptyEndpoint,
    InvalidDatabaseName(String),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(err) => write!(f, "cannot read {ENV_PREFIX}_* variables: {err}"),
            Self::EmptyEndpoint => write!(f, "{ENDPOINT_VAR} cannot be empty"),
            Self::InvalidDatabaseName(name) => write!(
                f,
                "invalid {DATABASE_VAR} `{name}`; expected letters, digits, `_` or `-`"
            ),
            Self::InvalidLogLevel(message) => write!(f, "invalid {LOG_LEVEL_VAR}: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(value: config::ConfigError) -> Self {
        Self::Source(value)
    }
}

/// Where to connect and how to log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding database files, or [`MEMORY_ENDPOINT`].
    pub endpoint: String,
    pub database: String,
    pub log_level: String,
    /// Absolute directory for rolling log files; stderr when `None`.
    pub log_dir: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CatalogConfig {
    /// Config for a file database in `endpoint`.
    pub fn new(endpoint: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MEMORY_ENDPOINT, DEFAULT_DATABASE)
    }

    /// Reads `CATALOG_*` variables from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    /// Builds and validates a config from an environment source; unset or
    /// empty variables keep their defaults.
    pub fn from_environment(environment: Environment) -> ConfigResult<Self> {
        let mut config = config::Config::builder()
            .add_source(environment.ignore_empty(true))
            .build()?
            .try_deserialize::<Self>()?;

        config.endpoint = config.endpoint.trim().to_string();
        config.database = config.database.trim().to_string();
        config.log_dir = config
            .log_dir
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if !DATABASE_NAME_RE.is_match(&self.database) {
            return Err(ConfigError::InvalidDatabaseName(self.database.clone()));
        }
        normalize_level(&self.log_level).map_err(ConfigError::InvalidLogLevel)?;
        Ok(())
    }

    pub fn collection(&self) -> &'static str {
        COLLECTION_NAME
    }

    pub fn is_in_memory(&self) -> bool {
        self.endpoint == MEMORY_ENDPOINT
    }

    /// Database file path; `None` for the in-memory endpoint.
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.is_in_memory() {
            return None;
        }
        Some(
            PathBuf::from(&self.endpoint)
                .join(format!("{}.{DATABASE_FILE_EXTENSION}", self.database)),
        )
    }

    /// Human-readable connection target used in logs and reports.
    pub fn target_label(&self) -> String {
        match self.database_path() {
            Some(path) => path.display().to_string(),
            None => format!("{MEMORY_ENDPOINT}{}", self.database),
        }
    }
}
