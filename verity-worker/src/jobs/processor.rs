//! Single-job processing
//!
//! Takes one dequeued [`JobMessage`] through `processing` to a terminal
//! status. Analysis failures become a failed job; only store errors and
//! cancellation are returned to the caller.

use std::sync::Arc;
use std::time::Instant;
use verity_agents::AnalysisPipeline;
use verity_core::{
    JobMessage, RequestContext, StorageError, TransitionOutcome, VerityError,
    VerityResult,
};
use verity_storage::{JobStore, TranscriptStore};

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Failed,
    /// The job was already terminal, so the message was a redelivery
    Skipped,
}

pub struct JobProcessor {
    jobs: Arc<dyn JobStore>,
    transcripts: Arc<dyn TranscriptStore>,
    pipeline: Arc<AnalysisPipeline>,
}

impl JobProcessor {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        transcripts: Arc<dyn TranscriptStore>,
        pipeline: Arc<AnalysisPipeline>,
    ) -> Self {
        Self {
            jobs,
            transcripts,
            pipeline,
        }
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    pub async fn process(
        &self,
        ctx: &RequestContext,
        message: &JobMessage,
    ) -> VerityResult<ProcessOutcome> {
        let job_id = message.job_id;
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| VerityError::job_not_found(job_id))?;

        if job.status.is_terminal() {
            tracing::info!(
                correlation_id = %ctx.correlation_id(),
                job_id = %job_id,
                status = %job.status,
                "Job already finished, skipping redelivered message"
            );
            return Ok(ProcessOutcome::Skipped);
        }

        if self.jobs.begin_processing(job_id).await? == TransitionOutcome::Unchanged {
            tracing::warn!(
                correlation_id = %ctx.correlation_id(),
                job_id = %job_id,
                "Job was already processing, resuming after redelivery"
            );
        }

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            job_id = %job_id,
            transcript_id = %message.transcript_id,
            "Processing analysis job"
        );

        let content = match self.transcripts.read_content(message.transcript_id).await {
            Ok(content) => content,
            Err(VerityError::Storage(StorageError::NotFound { .. })) => {
                let reason = format!("Transcript not found: {}", message.transcript_id);
                return self.fail(ctx, message, &reason).await;
            }
            Err(e) => {
                let reason = match &e {
                    VerityError::Storage(StorageError::ReadFailed { reason, .. }) => {
                        format!("Failed to read transcript content: {}", reason)
                    }
                    other => format!("Failed to read transcript content: {}", other),
                };
                return self.fail(ctx, message, &reason).await;
            }
        };

        let started = Instant::now();
        match self.pipeline.run(ctx, &content).await {
            Ok(results) => {
                self.jobs.complete(job_id, results).await?;
                tracing::info!(
                    correlation_id = %ctx.correlation_id(),
                    job_id = %job_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Analysis job completed"
                );
                Ok(ProcessOutcome::Completed)
            }
            Err(e) => {
                let reason = format!(
                    "Analysis processing failed after {:?}: {}",
                    started.elapsed(),
                    e
                );
                self.fail(ctx, message, &reason).await
            }
        }
    }

    async fn fail(
        &self,
        ctx: &RequestContext,
        message: &JobMessage,
        reason: &str,
    ) -> VerityResult<ProcessOutcome> {
        tracing::error!(
            correlation_id = %ctx.correlation_id(),
            job_id = %message.job_id,
            error = reason,
            "Analysis job failed"
        );
        self.jobs.fail(message.job_id, reason).await?;
        Ok(ProcessOutcome::Failed)
    }
}
