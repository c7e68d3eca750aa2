//! Job control surface
//!
//! Creates analysis jobs, reports their status, and returns results. This is
//! what an outer request layer calls; it never runs analysis itself.

use crate::error::{ServiceError, ServiceResult};
use crate::queue::JobQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use verity_core::{AnalysisJob, AnalysisResults, JobStatus, RequestContext};
use verity_storage::{JobStore, TranscriptStore};

/// Message returned with a newly created job.
pub const JOB_CREATED_MESSAGE: &str = "Analysis job created and queued for processing";

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Response for a successful job creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: Uuid,
    pub transcript_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Point-in-time view of a job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub transcript_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&AnalysisJob> for JobStatusView {
    fn from(job: &AnalysisJob) -> Self {
        Self {
            job_id: job.job_id,
            transcript_id: job.transcript_id,
            status: job.status,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error_message: job.error_message.clone(),
        }
    }
}

/// Parse a raw job id, mapping bad input to `INVALID_JOB_ID`.
pub fn parse_job_id(raw: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::invalid_job_id(raw))
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Clone)]
pub struct JobService {
    jobs: Arc<dyn JobStore>,
    transcripts: Arc<dyn TranscriptStore>,
    queue: Arc<dyn JobQueue>,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        transcripts: Arc<dyn TranscriptStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            jobs,
            transcripts,
            queue,
        }
    }

    /// Create a pending job for `transcript_id` and queue it.
    ///
    /// If the message cannot be queued the job is marked failed and an
    /// `ANALYSIS_CREATION_ERROR` is returned, so callers never receive the id
    /// of a job that will not run.
    pub async fn create_job(
        &self,
        ctx: &RequestContext,
        transcript_id: Uuid,
    ) -> ServiceResult<JobCreated> {
        ctx.ensure_active()
            .map_err(|e| ServiceError::creation_failed(e.to_string()))?;
        let exists = self.transcripts.exists(transcript_id).await.map_err(|e| {
            tracing::error!(
                correlation_id = %ctx.correlation_id(),
                transcript_id = %transcript_id,
                error = %e,
                "Failed to check transcript"
            );
            ServiceError::creation_failed(format!("Failed to check transcript: {}", e))
        })?;
        if !exists {
            return Err(ServiceError::transcript_not_found(transcript_id));
        }

        let job = AnalysisJob::new(transcript_id);
        self.jobs.insert(&job).await.map_err(|e| {
            tracing::error!(
                correlation_id = %ctx.correlation_id(),
                transcript_id = %transcript_id,
                error = %e,
                "Failed to create analysis job"
            );
            ServiceError::creation_failed(format!("Failed to create analysis job: {}", e))
        })?;

        if let Err(e) = self.queue.publish(&job.message()).await {
            let message = format!("Failed to queue job for processing: {}", e);
            tracing::error!(
                correlation_id = %ctx.correlation_id(),
                job_id = %job.job_id,
                error = %e,
                "Failed to enqueue analysis job"
            );
            if let Err(update) = self.jobs.fail(job.job_id, &message).await {
                tracing::error!(
                    job_id = %job.job_id,
                    error = %update,
                    "Failed to mark unqueued job as failed"
                );
            }
            return Err(ServiceError::creation_failed(message));
        }

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            job_id = %job.job_id,
            transcript_id = %transcript_id,
            "Analysis job created"
        );

        Ok(JobCreated {
            job_id: job.job_id,
            transcript_id,
            status: job.status,
            message: JOB_CREATED_MESSAGE.to_string(),
        })
    }

    /// Current status of a job. Pure read.
    pub async fn get_status(&self, job_id: Uuid) -> ServiceResult<JobStatusView> {
        let job = self.load(job_id).await?;
        Ok(JobStatusView::from(&job))
    }

    /// Results of a completed job.
    pub async fn get_results(&self, job_id: Uuid) -> ServiceResult<AnalysisResults> {
        let job = self.load(job_id).await?;
        match job.status {
            JobStatus::Completed => Ok(job.results()),
            JobStatus::Failed => {
                let reason = job.error_message.as_deref().unwrap_or("unknown error");
                Err(ServiceError::results_not_ready(format!(
                    "Analysis job failed: {}",
                    reason
                )))
            }
            status => Err(ServiceError::results_not_ready(format!(
                "Analysis job is {}",
                status
            ))),
        }
    }

    /// Poll until the job reaches a terminal status.
    ///
    /// Returns the last observed status early if `ctx` is cancelled.
    pub async fn wait_for_terminal(
        &self,
        ctx: &RequestContext,
        job_id: Uuid,
        poll_interval: Duration,
    ) -> ServiceResult<JobStatusView> {
        loop {
            let view = self.get_status(job_id).await?;
            if view.status.is_terminal() || ctx.sleep(poll_interval).await.is_err() {
                return Ok(view);
            }
        }
    }

    async fn load(&self, job_id: Uuid) -> ServiceResult<AnalysisJob> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| ServiceError::job_not_found(job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::queue::InMemoryQueue;
    use async_trait::async_trait;
    use verity_core::{JobMessage, QueueError, VerityResult};
    use verity_storage::{InMemoryJobStore, InMemoryTranscriptStore};
    use verity_test_utils::fixtures::{sample_results, sample_transcript};

    struct BrokenQueue;

    #[async_trait]
    impl JobQueue for BrokenQueue {
        async fn publish(&self, _message: &JobMessage) -> VerityResult<()> {
            Err(QueueError::PublishFailed {
                reason: "broker unavailable".to_string(),
            }
            .into())
        }
    }

    struct Harness {
        jobs: Arc<InMemoryJobStore>,
        transcripts: Arc<InMemoryTranscriptStore>,
        queue: InMemoryQueue,
        service: JobService,
    }

    fn harness() -> Harness {
        let jobs = Arc::new(InMemoryJobStore::new());
        let transcripts = Arc::new(InMemoryTranscriptStore::new());
        let queue = InMemoryQueue::new(8);
        let service = JobService::new(jobs.clone(), transcripts.clone(), Arc::new(queue.clone()));
        Harness {
            jobs,
            transcripts,
            queue,
            service,
        }
    }

    #[tokio::test]
    async fn test_create_job_queues_message() {
        let h = harness();
        let transcript_id = h.transcripts.insert(sample_transcript());

        let created = h
            .service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap();
        assert_eq!(created.status, JobStatus::Pending);
        assert_eq!(created.message, JOB_CREATED_MESSAGE);

        let payload = crate::queue::JobConsumer::receive(&h.queue).await.unwrap();
        let message = JobMessage::from_json(&payload).unwrap();
        assert_eq!(message.job_id, created.job_id);
        assert_eq!(message.transcript_id, transcript_id);
    }

    #[tokio::test]
    async fn test_create_job_missing_transcript() {
        let h = harness();
        let err = h
            .service
            .create_job(&RequestContext::new(), Uuid::now_v7())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TranscriptNotFound);
        assert!(h.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_failure_marks_job_failed() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let transcripts = Arc::new(InMemoryTranscriptStore::new());
        let transcript_id = transcripts.insert(sample_transcript());
        let service = JobService::new(jobs.clone(), transcripts, Arc::new(BrokenQueue));

        let err = service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisCreationError);
        assert!(err.message.contains("broker unavailable"));
        assert_eq!(jobs.count_by_status(JobStatus::Failed), 1);
    }

    #[tokio::test]
    async fn test_full_queue_fails_job_without_blocking() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let transcripts = Arc::new(InMemoryTranscriptStore::new());
        let queue = InMemoryQueue::new(1);
        let service = JobService::new(jobs.clone(), transcripts.clone(), Arc::new(queue.clone()));
        let transcript_id = transcripts.insert(sample_transcript());

        service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap();
        let err = tokio::time::timeout(
            Duration::from_secs(2),
            service.create_job(&RequestContext::new(), transcript_id),
        )
        .await
        .expect("create_job blocked on a full queue")
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::AnalysisCreationError);
        assert!(err.message.starts_with("Failed to queue job for processing:"));
        assert_eq!(jobs.count_by_status(JobStatus::Pending), 1);
        assert_eq!(jobs.count_by_status(JobStatus::Failed), 1);
    }

    #[tokio::test]
    async fn test_create_job_with_cancelled_context() {
        let h = harness();
        let transcript_id = h.transcripts.insert(sample_transcript());
        let ctx = RequestContext::new();
        ctx.cancel();

        let err = h.service.create_job(&ctx, transcript_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisCreationError);
        assert_eq!(err.message, "Operation cancelled");
        assert!(h.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_status_and_results() {
        let h = harness();
        let transcript_id = h.transcripts.insert(sample_transcript());
        let created = h
            .service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap();

        let status = h.service.get_status(created.job_id).await.unwrap();
        assert_eq!(status.status, JobStatus::Pending);
        assert!(status.completed_at.is_none());

        let err = h.service.get_results(created.job_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResultsNotReady);

        h.jobs.begin_processing(created.job_id).await.unwrap();
        h.jobs.complete(created.job_id, sample_results()).await.unwrap();

        let status = h.service.get_status(created.job_id).await.unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        assert!(status.completed_at.is_some());
        assert_eq!(
            h.service.get_results(created.job_id).await.unwrap(),
            sample_results()
        );
    }

    #[tokio::test]
    async fn test_failed_job_results_report_error() {
        let h = harness();
        let transcript_id = h.transcripts.insert(sample_transcript());
        let created = h
            .service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap();
        h.jobs.begin_processing(created.job_id).await.unwrap();
        h.jobs.fail(created.job_id, "summarizer exploded").await.unwrap();

        let err = h.service.get_results(created.job_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResultsNotReady);
        assert!(err.message.contains("summarizer exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_terminal() {
        let h = harness();
        let transcript_id = h.transcripts.insert(sample_transcript());
        let created = h
            .service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap();

        let jobs = h.jobs.clone();
        let job_id = created.job_id;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            jobs.begin_processing(job_id).await.unwrap();
            jobs.fail(job_id, "boom").await.unwrap();
        });

        let view = h
            .service
            .wait_for_terminal(&RequestContext::new(), job_id, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_terminal_stops_on_cancel() {
        let h = harness();
        let transcript_id = h.transcripts.insert(sample_transcript());
        let created = h
            .service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap();

        let ctx = RequestContext::new();
        ctx.cancel();
        let view = h
            .service
            .wait_for_terminal(&ctx, created.job_id, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(view.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let h = harness();
        let err = h.service.get_status(Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::JobNotFound);
    }

    #[test]
    fn test_parse_job_id() {
        let id = Uuid::now_v7();
        assert_eq!(parse_job_id(&id.to_string()).unwrap(), id);
        assert_eq!(
            parse_job_id("not-a-uuid").unwrap_err().code,
            ErrorCode::InvalidJobId
        );
    }

    #[test]
    fn test_status_view_omits_absent_fields() {
        let job = AnalysisJob::new(Uuid::now_v7());
        let json = serde_json::to_value(JobStatusView::from(&job)).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("completed_at").is_none());
        assert!(json.get("error_message").is_none());
    }
}
