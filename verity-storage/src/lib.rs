//! Verity Storage - Job and Transcript Stores
//!
//! Defines the storage seams the worker depends on. Jobs are single-row
//! records updated by key; transcripts are read-only content owned by an
//! external upload path.

pub mod job_store;
pub mod transcript_store;

pub use job_store::InMemoryJobStore;
pub use transcript_store::{FsTranscriptStore, InMemoryTranscriptStore, TRANSCRIPT_EXTENSION};

use async_trait::async_trait;
use uuid::Uuid;
use verity_core::{
    AnalysisJob, AnalysisResults, HealthCheck, TransitionOutcome, VerityResult,
};

// ============================================================================
// JOB STORE
// ============================================================================

/// Keyed storage for analysis jobs.
///
/// Status writes go through the job's own transition rules, so replaying the
/// same write (at-least-once delivery) returns [`TransitionOutcome::Unchanged`]
/// instead of an error, and a write that would move a job backwards fails with
/// `StorageError::InvalidTransition`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails if the id is already present.
    async fn insert(&self, job: &AnalysisJob) -> VerityResult<()>;

    /// Get a job by id.
    async fn get(&self, job_id: Uuid) -> VerityResult<Option<AnalysisJob>>;

    /// Mark a job as processing.
    async fn begin_processing(&self, job_id: Uuid) -> VerityResult<TransitionOutcome>;

    /// Store results and mark the job completed.
    async fn complete(
        &self,
        job_id: Uuid,
        results: AnalysisResults,
    ) -> VerityResult<TransitionOutcome>;

    /// Mark the job failed with a human-readable message.
    async fn fail(&self, job_id: Uuid, message: &str) -> VerityResult<TransitionOutcome>;
}

// ============================================================================
// TRANSCRIPT STORE
// ============================================================================

/// Read access to transcript content.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Whether a transcript with this id exists.
    async fn exists(&self, transcript_id: Uuid) -> VerityResult<bool>;

    /// Full text content. Missing transcripts return a not-found error.
    async fn read_content(&self, transcript_id: Uuid) -> VerityResult<String>;

    async fn health_check(&self) -> HealthCheck {
        HealthCheck::healthy("transcript_store")
    }
}
