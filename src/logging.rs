//! Structured logging setup.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//!
//! Environment variables:
//! - `RUST_LOG`: filter directives (e.g. "debug", "report_engine=trace")
//! - `LOG_FORMAT`: output format ("pretty", "json", "compact")
//!
//! Both fall back to the `[logging]` section of the settings.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingSettings;

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format for development
    #[default]
    Pretty,
    /// JSON format for production (structured logging)
    Json,
    /// Compact format for testing
    Compact,
}

impl LogFormat {
    /// Parse a format name. Unknown names fall back to pretty.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }

    /// `LOG_FORMAT` if set, otherwise `fallback`.
    pub fn from_env_or(fallback: &str) -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(format) => Self::parse(&format),
            Err(_) => Self::parse(fallback),
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(settings: &LoggingSettings) {
    let format = LogFormat::from_env_or(&settings.format);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let layer = match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(format = ?format, level = %settings.level, "logging initialized");
    }
}
