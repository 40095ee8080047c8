//! # Structured Logging
//!
//! Installs a `tracing` subscriber with an environment filter and either JSON
//! or human-readable output. Records emitted through the `log` facade are
//! bridged into the same subscriber.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::error::ConfigError;

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name attached to the startup record
    pub service_name: String,
    /// Whether to use JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "analysis-ingest".to_string(),
            json_format: false,
        }
    }
}

/// Initializes structured logging. Calling it again is a no-op.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Invalid(format!("LOG_LEVEL '{}': {}", config.level, e)))?;

    let registry = Registry::default().with(filter);

    let result = if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true);
        registry.with(json_layer).try_init()
    } else {
        let text_layer = fmt::layer().with_target(true);
        registry.with(text_layer).try_init()
    };

    if let Err(e) = result {
        LOGGING_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(ConfigError::Invalid(format!(
            "Failed to set global subscriber: {}",
            e
        )));
    }

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json_format,
        "Structured logging initialized"
    );
    Ok(())
}
