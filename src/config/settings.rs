//! TOML-based configuration for the report engine.
//!
//! Supports a config file (report-engine.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [engine]
//! name = "sql"
//!
//! [database]
//! driver = "sqlite"
//! path = "${DATA_DIR}/crm.db"
//!
//! [catalog]
//! path = "./metadata.json"
//!
//! [saved_filters]
//! table = "saved_filters"
//!
//! [query]
//! timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exec::DEFAULT_QUERY_TIMEOUT;
use crate::report::{DEFAULT_SAVED_FILTERS_TABLE, SQL_ENGINE};
use crate::sql::Dialect;

/// Points at an explicit config file.
pub const CONFIG_ENV: &str = "REPORT_ENGINE_CONFIG";

/// Overrides `[engine] name`.
pub const ENGINE_ENV: &str = "REPORT_ENGINE";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub database: DatabaseSettings,
    pub catalog: CatalogSettings,
    pub saved_filters: SavedFilterSettings,
    pub query: QuerySettings,
    pub logging: LoggingSettings,
}

/// Which report engine to build.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    pub name: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            name: SQL_ENGINE.to_string(),
        }
    }
}

/// Database the reports run against.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Driver name (sqlite, pgsql, mysql). Selects the SQL dialect.
    pub driver: String,

    /// Database file (supports ${ENV_VAR} expansion). `None` or
    /// `:memory:` opens an in-memory database.
    pub path: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            path: None,
        }
    }
}

impl DatabaseSettings {
    pub fn dialect(&self) -> Dialect {
        Dialect::from_driver(&self.driver)
    }

    /// Get the database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        match self.path.as_deref() {
            None | Some("") | Some(":memory:") => Ok(None),
            Some(path) => Ok(Some(PathBuf::from(expand_env_vars(path)?))),
        }
    }
}

/// Entity metadata source.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON or TOML metadata file (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl CatalogSettings {
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Stored filter lookup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SavedFilterSettings {
    pub table: String,
}

impl Default for SavedFilterSettings {
    fn default() -> Self {
        Self {
            table: DEFAULT_SAVED_FILTERS_TABLE.to_string(),
        }
    }
}

/// Per-query limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    pub timeout_secs: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_QUERY_TIMEOUT.as_secs(),
        }
    }
}

impl QuerySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log output.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,

    /// pretty, json or compact. `LOG_FORMAT` takes precedence.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `REPORT_ENGINE_CONFIG`
    /// 2. `./report-engine.toml`
    /// 3. `~/.config/report-engine/config.toml`
    ///
    /// Falls back to defaults. `REPORT_ENGINE` then overrides the engine name.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_file()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Like [`Settings::load`], but with an explicit file taking precedence.
    pub fn load_from(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_file()?,
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn load_file() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("report-engine.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("report-engine").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var(ENGINE_ENV) {
            if !name.trim().is_empty() {
                self.engine.name = name;
            }
        }
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.query.timeout_secs == 0 {
            return Err(SettingsError::InvalidConfig(
                "query.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.saved_filters.table.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "saved_filters.table must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            name
        };

        if var_name.is_empty() {
            // Lone $, keep it
            result.push('$');
            continue;
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
