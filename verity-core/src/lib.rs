//! Verity Core - Entity Types
//!
//! Data structures shared by every Verity crate: analysis jobs and fact
//! checks, the job status state machine, the error taxonomy, configuration,
//! and the request context threaded through external calls.
//! This crate performs no I/O.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod context;
pub mod entities;
pub mod enums;
pub mod error;
pub mod health;

pub use config::{
    AgentLimits, AnthropicSettings, RetryConfig, SerperSettings, VerityConfig, WorkerSettings,
};
pub use context::{CorrelationId, RequestContext, CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
pub use entities::{
    clamp_confidence, AnalysisJob, AnalysisResults, FactCheck, JobMessage, TransitionOutcome,
    VerdictTally,
};
pub use enums::{EntityType, JobStatus, JobStatusParseError, Verdict, VerdictParseError};
pub use error::{
    AgentError, ConfigError, ErrorKind, LlmError, QueueError, StorageError, ValidationError,
    VerityError, VerityResult,
};
pub use health::{HealthCheck, HealthStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_id_is_v7() {
        let a = new_entity_id();
        let b = new_entity_id();
        assert_eq!(a.get_version_num(), 7);
        assert_ne!(a, b);
    }
}
