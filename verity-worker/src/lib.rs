//! Verity Worker - Job Service and Queue Workers
//!
//! The job control surface creates analysis jobs and reports their status.
//! A pool of workers consumes the job queue, runs the analysis pipeline for
//! each job, and records the outcome. Job records live behind
//! [`verity_storage::JobStore`]; the queue behind [`queue::JobQueue`].

pub mod error;
pub mod jobs;
pub mod queue;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use jobs::{JobProcessor, ProcessOutcome, WorkerMetrics, WorkerMetricsSnapshot, WorkerPool};
pub use queue::{InMemoryQueue, JobConsumer, JobQueue};
pub use service::{parse_job_id, JobCreated, JobService, JobStatusView, JOB_CREATED_MESSAGE};
