//! Tracing subscriber initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use verity_core::{VerityError, VerityResult};

/// Filter used when neither `RUST_LOG` nor a log level is configured.
pub const DEFAULT_FILTER: &str = "verity_worker=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Plain level such as `info` or `debug`, applied to every target
    pub log_level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TelemetryConfig {
    /// # Environment Variables
    /// - `VERITY_SERVICE_NAME` (default: `verity-worker`)
    /// - `VERITY_LOG_LEVEL`, then `LOG_LEVEL`
    /// - `VERITY_LOG_JSON` (default: true)
    fn default() -> Self {
        Self {
            service_name: std::env::var("VERITY_SERVICE_NAME")
                .unwrap_or_else(|_| "verity-worker".to_string()),
            log_level: std::env::var("VERITY_LOG_LEVEL")
                .or_else(|_| std::env::var("LOG_LEVEL"))
                .ok()
                .filter(|s| !s.trim().is_empty()),
            json: std::env::var("VERITY_LOG_JSON")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(true),
        }
    }
}

impl TelemetryConfig {
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }
}

/// Pick the filter directive: `RUST_LOG` first, then the configured level,
/// then [`DEFAULT_FILTER`].
pub fn resolve_filter(rust_log: Option<&str>, log_level: Option<&str>) -> String {
    fn configured(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|s| !s.is_empty())
    }

    configured(rust_log)
        .or_else(|| configured(log_level))
        .unwrap_or(DEFAULT_FILTER)
        .to_lowercase()
}

/// Install the global tracing subscriber.
///
/// Call once at startup, before any events are emitted. A second call fails
/// because a global subscriber is already set.
pub fn init_tracer(config: &TelemetryConfig) -> VerityResult<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = resolve_filter(rust_log.as_deref(), config.log_level.as_deref());
    let env_filter = EnvFilter::try_new(&directive).map_err(|e| VerityError::Unexpected {
        message: format!("Invalid log filter '{}': {}", directive, e),
    })?;

    let json_layer = config.json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| VerityError::Unexpected {
            message: format!("Failed to init subscriber: {}", e),
        })?;

    tracing::info!(
        service_name = config.service_name,
        filter = directive,
        json = config.json,
        "Telemetry initialized"
    );

    Ok(())
}
