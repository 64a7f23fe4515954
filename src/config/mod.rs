//! Configuration for the report engine.
//!
//! Handles the TOML settings file, environment variable expansion and
//! environment overrides.

mod settings;

pub use settings::{
    expand_env_vars, CatalogSettings, DatabaseSettings, EngineSettings, LoggingSettings,
    QuerySettings, SavedFilterSettings, Settings, SettingsError, CONFIG_ENV, ENGINE_ENV,
};
