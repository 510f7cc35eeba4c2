//! Telemetry initialization
//!
//! skipper is a one-shot compiler, so telemetry is structured logging only:
//! a `tracing-subscriber` registry with an `EnvFilter` and either a human
//! readable or a JSON formatter. Logs go to stderr; stdout is reserved for the
//! emitted descriptor.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,skipper=debug,skipper_service=debug";

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The `RUST_LOG` directive could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// Failed to initialize tracing subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Log line format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per event, with the current span attached
    Json,
}

/// Configuration for telemetry initialization
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Output format
    pub format: LogFormat,

    /// Explicit filter directive; falls back to `RUST_LOG`, then the default
    pub filter: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: std::env::var("RUST_LOG").ok(),
        }
    }
}

impl TelemetryConfig {
    fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match self.filter.as_deref() {
            Some(directive) if !directive.is_empty() => {
                EnvFilter::try_new(directive).map_err(|e| TelemetryError::Filter(e.to_string()))
            }
            _ => Ok(EnvFilter::new(DEFAULT_LOG_FILTER)),
        }
    }
}

/// Initialize logging with the given configuration
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = config.env_filter()?;

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
}
