//! Subscriber setup and span helpers.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! level. Output is either human-readable or one JSON object per line.

use gateway_config::{LogFormat, LoggingSettings};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "model-connector".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Take level and format from the loaded logging settings
    #[must_use]
    pub fn with_logging(mut self, logging: &LoggingSettings) -> Self {
        self.log_level.clone_from(&logging.level);
        self.format = logging.format;
        self
    }

    /// Set the log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.log_level)
                .map_err(|e| TracingError::Filter(format!("'{}': {e}", self.log_level))),
        }
    }
}

/// Install the global subscriber
///
/// # Errors
/// Returns error if the filter is invalid or a subscriber is already set
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| TracingError::Init(e.to_string()))?;

    info!(
        service = %config.service_name,
        version = %config.service_version,
        format = ?config.format,
        "Tracing initialized"
    );

    Ok(())
}

/// Fresh identifier for one RPC
#[must_use]
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Tracing initialization error
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Failed to initialize tracing
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
    /// Filter directive could not be parsed
    #[error("Invalid log filter {0}")]
    Filter(String),
}

/// Create a span for one RPC
#[macro_export]
macro_rules! rpc_span {
    ($request_id:expr, $method:expr, $provider:expr) => {
        tracing::info_span!(
            "rpc",
            request_id = %$request_id,
            method = %$method,
            provider = %$provider
        )
    };
}
