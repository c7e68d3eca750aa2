//! Error types for Verity operations

use crate::{EntityType, JobStatus};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Read failed for {entity_type} with id {id}: {reason}")]
    ReadFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },
}

/// Errors from outbound LLM and search provider calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("Provider {provider} is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    #[error("Transport error calling {provider}: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Server error from {provider} with status {status}: {message}")]
    ServerError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider} (retry after {retry_after_ms}ms): {message}")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
        message: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request to {provider} failed to serialize: {reason}")]
    Serialization { provider: String, reason: String },
}

impl LlmError {
    /// Whether the retry protocol may try this call again.
    ///
    /// Transport failures, 5xx responses and 429 responses are transient.
    /// Everything else fails immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Transport { .. } | LlmError::ServerError { .. } | LlmError::RateLimited { .. }
        )
    }

    /// Name of the provider that produced the error.
    pub fn provider(&self) -> &str {
        match self {
            LlmError::NotConfigured { provider, .. }
            | LlmError::Transport { provider, .. }
            | LlmError::RequestFailed { provider, .. }
            | LlmError::ServerError { provider, .. }
            | LlmError::RateLimited { provider, .. }
            | LlmError::InvalidResponse { provider, .. }
            | LlmError::Serialization { provider, .. } => provider,
        }
    }
}

/// Validation errors for caller-supplied input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Errors raised by analysis agents.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("cannot process empty content")]
    EmptyContent,

    #[error("content too short for meaningful analysis ({length} < {min} characters)")]
    ContentTooShort { length: usize, min: usize },

    #[error("content too long ({length} > {max} characters)")]
    ContentTooLong { length: usize, max: usize },

    #[error("{agent} produced invalid output: {reason}")]
    InvalidOutput { agent: String, reason: String },
}

/// Queue transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Failed to publish message: {reason}")]
    PublishFailed { reason: String },

    #[error("Queue is closed")]
    Closed,

    #[error("Malformed queue message: {reason}")]
    MalformedMessage { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Verity errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VerityError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unexpected failure: {message}")]
    Unexpected { message: String },
}

/// Result type alias for Verity operations.
pub type VerityResult<T> = Result<T, VerityError>;

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

/// Coarse classification used for propagation decisions and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad caller input; surfaced synchronously, never retried
    Validation,
    /// Referenced transcript or job is absent
    NotFound,
    /// Network failure, 5xx or 429 from a provider
    TransientApi,
    /// Non-429 4xx from a provider, or a provider that cannot be called
    PermanentApi,
    /// Provider output did not have the expected shape
    Parse,
    /// Panic caught at the worker's job boundary
    UnexpectedFailure,
    /// Caller cancelled the operation or its deadline passed
    Cancelled,
    /// Anything else (storage writes, queue, config)
    Internal,
}

impl VerityError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerityError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            VerityError::Storage(_) => ErrorKind::Internal,
            VerityError::Llm(LlmError::InvalidResponse { .. }) => ErrorKind::Parse,
            VerityError::Llm(e) if e.is_transient() => ErrorKind::TransientApi,
            VerityError::Llm(_) => ErrorKind::PermanentApi,
            VerityError::Validation(_) => ErrorKind::Validation,
            VerityError::Agent(AgentError::InvalidOutput { .. }) => ErrorKind::Parse,
            VerityError::Agent(_) => ErrorKind::Validation,
            VerityError::Queue(QueueError::MalformedMessage { .. }) => ErrorKind::Validation,
            VerityError::Queue(_) | VerityError::Config(_) => ErrorKind::Internal,
            VerityError::Cancelled => ErrorKind::Cancelled,
            VerityError::Unexpected { .. } => ErrorKind::UnexpectedFailure,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, VerityError::Cancelled)
    }

    /// Build a not-found error for a job.
    pub fn job_not_found(id: Uuid) -> Self {
        VerityError::Storage(StorageError::NotFound {
            entity_type: EntityType::Job,
            id,
        })
    }

    /// Build a not-found error for a transcript.
    pub fn transcript_not_found(id: Uuid) -> Self {
        VerityError::Storage(StorageError::NotFound {
            entity_type: EntityType::Transcript,
            id,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: EntityType::Transcript,
            id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("transcript"));
    }

    #[test]
    fn test_storage_error_display_invalid_transition() {
        let err = StorageError::InvalidTransition {
            job_id: Uuid::nil(),
            from: JobStatus::Completed,
            to: JobStatus::Processing,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("completed -> processing"));
    }

    #[test]
    fn test_llm_error_display_request_failed() {
        let err = LlmError::RequestFailed {
            provider: "anthropic".to_string(),
            status: 400,
            message: "bad request".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("anthropic"));
        assert!(msg.contains("400"));
        assert!(msg.contains("bad request"));
    }

    #[test]
    fn test_llm_error_transient_classification() {
        let transport = LlmError::Transport {
            provider: "serper".to_string(),
            reason: "connection reset".to_string(),
        };
        let server = LlmError::ServerError {
            provider: "anthropic".to_string(),
            status: 503,
            message: "overloaded".to_string(),
        };
        let limited = LlmError::RateLimited {
            provider: "anthropic".to_string(),
            retry_after_ms: 5000,
            message: "slow down".to_string(),
        };
        let rejected = LlmError::RequestFailed {
            provider: "anthropic".to_string(),
            status: 401,
            message: "invalid x-api-key".to_string(),
        };
        assert!(transport.is_transient());
        assert!(server.is_transient());
        assert!(limited.is_transient());
        assert!(!rejected.is_transient());
        assert_eq!(rejected.provider(), "anthropic");
    }

    #[test]
    fn test_agent_error_display() {
        assert_eq!(
            format!("{}", AgentError::EmptyContent),
            "cannot process empty content"
        );
        let msg = format!("{}", AgentError::ContentTooShort { length: 10, min: 50 });
        assert!(msg.starts_with("content too short for meaningful analysis"));
    }

    #[test]
    fn test_verity_error_from_conversions() {
        let err: VerityError = QueueError::Closed.into();
        assert!(matches!(err, VerityError::Queue(QueueError::Closed)));

        let err: VerityError = ConfigError::MissingRequired {
            field: "anthropic.api_key".to_string(),
        }
        .into();
        assert!(format!("{}", err).contains("anthropic.api_key"));
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            VerityError::job_not_found(Uuid::nil()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            VerityError::from(LlmError::ServerError {
                provider: "serper".to_string(),
                status: 502,
                message: String::new(),
            })
            .kind(),
            ErrorKind::TransientApi
        );
        assert_eq!(
            VerityError::from(LlmError::RequestFailed {
                provider: "serper".to_string(),
                status: 403,
                message: String::new(),
            })
            .kind(),
            ErrorKind::PermanentApi
        );
        assert_eq!(
            VerityError::from(LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: "empty response text".to_string(),
            })
            .kind(),
            ErrorKind::Parse
        );
        assert_eq!(
            VerityError::from(ValidationError::InvalidValue {
                field: "job_id".to_string(),
                reason: "not a uuid".to_string(),
            })
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(VerityError::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(VerityError::Cancelled.is_cancelled());
        assert_eq!(
            VerityError::Unexpected {
                message: "boom".to_string()
            }
            .kind(),
            ErrorKind::UnexpectedFailure
        );
    }
}
