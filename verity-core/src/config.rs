//! Configuration types
//!
//! Everything is loaded from environment variables with defaults suitable for
//! local development; `validate()` rejects values the pipeline cannot run with.

use crate::{ConfigError, VerityResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_SERPER_BASE_URL: &str = "https://google.serper.dev";

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Retry configuration for outbound provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any computed delay
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Environment variables:
    /// - `VERITY_MAX_RETRIES` (default: 3)
    /// - `VERITY_INITIAL_BACKOFF_MS` (default: 1000)
    /// - `VERITY_MAX_BACKOFF_MS` (default: 60000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_or("VERITY_MAX_RETRIES", defaults.max_retries),
            initial_backoff: Duration::from_millis(env_or(
                "VERITY_INITIAL_BACKOFF_MS",
                defaults.initial_backoff.as_millis() as u64,
            )),
            max_backoff: Duration::from_millis(env_or(
                "VERITY_MAX_BACKOFF_MS",
                defaults.max_backoff.as_millis() as u64,
            )),
            backoff_multiplier: defaults.backoff_multiplier,
        }
    }
}

// ============================================================================
// PROVIDERS
// ============================================================================

/// Settings for the LLM completion provider.
#[derive(Clone, PartialEq)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-attempt timeout; generation is slow so this is long
    pub timeout: Duration,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            api_version: DEFAULT_ANTHROPIC_VERSION.to_string(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            max_tokens: 4000,
            temperature: 0.1,
            timeout: Duration::from_secs(120),
        }
    }
}

impl AnthropicSettings {
    /// Environment variables:
    /// - `ANTHROPIC_API_KEY` (required)
    /// - `VERITY_ANTHROPIC_BASE_URL`
    /// - `VERITY_ANTHROPIC_MODEL` (default: claude-sonnet-4-20250514)
    /// - `VERITY_ANTHROPIC_MAX_TOKENS` (default: 4000)
    /// - `VERITY_ANTHROPIC_TEMPERATURE` (default: 0.1)
    /// - `VERITY_LLM_TIMEOUT_SECS` (default: 120)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env_string("ANTHROPIC_API_KEY").unwrap_or_default(),
            base_url: env_string("VERITY_ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
            api_version: defaults.api_version,
            model: env_string("VERITY_ANTHROPIC_MODEL").unwrap_or(defaults.model),
            max_tokens: env_or("VERITY_ANTHROPIC_MAX_TOKENS", defaults.max_tokens),
            temperature: env_or("VERITY_ANTHROPIC_TEMPERATURE", defaults.temperature),
            timeout: Duration::from_secs(env_or(
                "VERITY_LLM_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
        }
    }
}

impl std::fmt::Debug for AnthropicSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicSettings")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the web search provider.
#[derive(Clone, PartialEq)]
pub struct SerperSettings {
    /// Optional; searches fail with a permanent error without it
    pub api_key: Option<String>,
    pub base_url: String,
    pub num_results: u32,
    pub timeout: Duration,
}

impl Default for SerperSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_SERPER_BASE_URL.to_string(),
            num_results: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SerperSettings {
    /// Environment variables:
    /// - `SERPER_API_KEY`
    /// - `VERITY_SERPER_BASE_URL`
    /// - `VERITY_SEARCH_RESULTS` (default: 5)
    /// - `VERITY_SEARCH_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env_string("SERPER_API_KEY"),
            base_url: env_string("VERITY_SERPER_BASE_URL").unwrap_or(defaults.base_url),
            num_results: env_or("VERITY_SEARCH_RESULTS", defaults.num_results),
            timeout: Duration::from_secs(env_or(
                "VERITY_SEARCH_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
        }
    }
}

impl std::fmt::Debug for SerperSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("num_results", &self.num_results)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// AGENT LIMITS
// ============================================================================

/// Input and output bounds for the analysis agents.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentLimits {
    pub min_content_chars: usize,
    pub max_content_chars: usize,
    pub summarizer_input_chars: usize,
    pub summary_max_chars: usize,
    pub summary_min_chars: usize,
    pub takeaway_input_chars: usize,
    pub max_takeaways: usize,
    pub claim_input_chars: usize,
    pub max_claims: usize,
    /// Pause between consecutive claim verifications
    pub claim_delay: Duration,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            min_content_chars: 50,
            max_content_chars: 1_000_000,
            summarizer_input_chars: 15_000,
            summary_max_chars: 150,
            summary_min_chars: 20,
            takeaway_input_chars: 12_000,
            max_takeaways: 10,
            claim_input_chars: 10_000,
            max_claims: 3,
            claim_delay: Duration::from_secs(3),
        }
    }
}

impl AgentLimits {
    /// Environment variables:
    /// - `VERITY_CLAIM_DELAY_MS` (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            claim_delay: Duration::from_millis(env_or(
                "VERITY_CLAIM_DELAY_MS",
                defaults.claim_delay.as_millis() as u64,
            )),
            ..defaults
        }
    }
}

// ============================================================================
// WORKER
// ============================================================================

/// Worker pool and queue sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub worker_count: usize,
    pub queue_capacity: usize,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_grace: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_count: 2,
            queue_capacity: 256,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl WorkerSettings {
    /// Environment variables:
    /// - `VERITY_WORKER_COUNT` (default: 2)
    /// - `VERITY_QUEUE_CAPACITY` (default: 256)
    /// - `VERITY_SHUTDOWN_GRACE_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_or("VERITY_WORKER_COUNT", defaults.worker_count),
            queue_capacity: env_or("VERITY_QUEUE_CAPACITY", defaults.queue_capacity),
            shutdown_grace: Duration::from_secs(env_or(
                "VERITY_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )),
        }
    }

    /// Single worker, small queue.
    pub fn development() -> Self {
        Self {
            worker_count: 1,
            queue_capacity: 16,
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// More workers and a deeper queue.
    pub fn production() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 1024,
            shutdown_grace: Duration::from_secs(120),
        }
    }
}

// ============================================================================
// MASTER CONFIG
// ============================================================================

/// Master configuration for the pipeline and worker.
#[derive(Debug, Clone, PartialEq)]
pub struct VerityConfig {
    pub anthropic: AnthropicSettings,
    pub serper: SerperSettings,
    pub retry: RetryConfig,
    pub limits: AgentLimits,
    pub worker: WorkerSettings,
    /// Directory holding transcript files named `<uuid>.txt`
    pub storage_path: PathBuf,
    pub log_level: String,
}

impl Default for VerityConfig {
    fn default() -> Self {
        Self {
            anthropic: AnthropicSettings::default(),
            serper: SerperSettings::default(),
            retry: RetryConfig::default(),
            limits: AgentLimits::default(),
            worker: WorkerSettings::default(),
            storage_path: PathBuf::from("./storage/transcripts"),
            log_level: "info".to_string(),
        }
    }
}

impl VerityConfig {
    /// Load every section from the environment.
    ///
    /// Also reads `STORAGE_PATH` and `LOG_LEVEL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            anthropic: AnthropicSettings::from_env(),
            serper: SerperSettings::from_env(),
            retry: RetryConfig::from_env(),
            limits: AgentLimits::from_env(),
            worker: WorkerSettings::from_env(),
            storage_path: env_string("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            log_level: env_string("LOG_LEVEL")
                .map(|s| s.to_lowercase())
                .unwrap_or(defaults.log_level),
        }
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(VerityError::Config) if invalid.
    pub fn validate(&self) -> VerityResult<()> {
        if self.anthropic.api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "ANTHROPIC_API_KEY".to_string(),
            }
            .into());
        }

        if self.anthropic.max_tokens == 0 {
            return Err(invalid(
                "anthropic.max_tokens",
                self.anthropic.max_tokens,
                "max_tokens must be greater than 0",
            )
            .into());
        }

        if !(0.0..=1.0).contains(&self.anthropic.temperature) {
            return Err(invalid(
                "anthropic.temperature",
                self.anthropic.temperature,
                "temperature must be between 0.0 and 1.0",
            )
            .into());
        }

        if self.anthropic.timeout.is_zero() {
            return Err(invalid(
                "anthropic.timeout",
                format!("{:?}", self.anthropic.timeout),
                "timeout must be positive",
            )
            .into());
        }

        if self.serper.timeout.is_zero() {
            return Err(invalid(
                "serper.timeout",
                format!("{:?}", self.serper.timeout),
                "timeout must be positive",
            )
            .into());
        }

        if self.serper.num_results == 0 {
            return Err(invalid(
                "serper.num_results",
                self.serper.num_results,
                "num_results must be greater than 0",
            )
            .into());
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(invalid(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier,
                "backoff_multiplier must be at least 1.0",
            )
            .into());
        }

        if self.limits.summary_min_chars >= self.limits.summary_max_chars {
            return Err(invalid(
                "limits.summary_min_chars",
                self.limits.summary_min_chars,
                "summary_min_chars must be below summary_max_chars",
            )
            .into());
        }

        if self.limits.max_claims == 0 || self.limits.max_takeaways == 0 {
            return Err(invalid(
                "limits.max_claims",
                self.limits.max_claims,
                "claim and takeaway caps must be greater than 0",
            )
            .into());
        }

        if self.worker.worker_count == 0 {
            return Err(invalid(
                "worker.worker_count",
                self.worker.worker_count,
                "worker_count must be greater than 0",
            )
            .into());
        }

        if self.worker.queue_capacity == 0 {
            return Err(invalid(
                "worker.queue_capacity",
                self.worker.queue_capacity,
                "queue_capacity must be greater than 0",
            )
            .into());
        }

        Ok(())
    }
}
