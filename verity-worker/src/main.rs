//! Verity Worker Entry Point
//!
//! Loads configuration, starts the worker pool, and submits one analysis job
//! per command-line argument. An argument is either a transcript id already
//! present under `STORAGE_PATH` or a path to a text file, which is copied
//! into the transcript store first. Each finished job is printed as JSON.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use verity_agents::AnalysisPipeline;
use verity_core::{RequestContext, VerityConfig};
use verity_llm::{AnthropicClient, CostTracker, SerperClient};
use verity_storage::{FsTranscriptStore, InMemoryJobStore, TranscriptStore};
use verity_worker::telemetry::{init_tracer, TelemetryConfig};
use verity_worker::{
    ErrorCode, InMemoryQueue, JobProcessor, JobService, ServiceError, ServiceResult, WorkerPool,
};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> ServiceResult<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = VerityConfig::from_env();
    let mut telemetry = TelemetryConfig::default();
    if telemetry.log_level.is_none() {
        telemetry = telemetry.with_log_level(config.log_level.clone());
    }
    init_tracer(&telemetry)?;
    config.validate()?;

    let cost_tracker = Arc::new(CostTracker::new());
    let llm = Arc::new(
        AnthropicClient::new(config.anthropic.clone(), &config.retry)?
            .with_cost_tracker(cost_tracker.clone()),
    );
    let search = Arc::new(SerperClient::new(config.serper.clone(), &config.retry)?);
    if !search.is_configured() {
        tracing::warn!("SERPER_API_KEY not set, every claim will be unverifiable");
    }

    let transcripts = Arc::new(FsTranscriptStore::new(&config.storage_path));
    let jobs = Arc::new(InMemoryJobStore::new());
    let queue = InMemoryQueue::new(config.worker.queue_capacity);

    let pipeline = AnalysisPipeline::builder(llm, search)
        .limits(config.limits.clone())
        .build();
    let processor = Arc::new(JobProcessor::new(
        jobs.clone(),
        transcripts.clone(),
        Arc::new(pipeline),
    ));
    let pool = WorkerPool::spawn(processor, queue.consumer(), &config.worker);
    let service = JobService::new(jobs, transcripts.clone(), Arc::new(queue.clone()));

    let store_health = transcripts.health_check().await;
    if !store_health.is_healthy() {
        tracing::warn!(
            path = %config.storage_path.display(),
            message = ?store_health.message,
            "Transcript store is not ready"
        );
    }

    let ctx = RequestContext::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_ctx.cancel();
    });

    let mut submitted = Vec::new();
    for arg in std::env::args().skip(1) {
        let created = match resolve_transcript(&transcripts, &arg).await {
            Ok(transcript_id) => service.create_job(&ctx, transcript_id).await,
            Err(e) => Err(e),
        };
        match created {
            Ok(job) => submitted.push(job.job_id),
            Err(e) => tracing::error!(input = %arg, error = %e, "Could not submit transcript"),
        }
    }

    if submitted.is_empty() {
        tracing::info!("No jobs submitted, waiting for shutdown signal");
        ctx.cancellation().cancelled().await;
    }

    for job_id in submitted {
        let status = service.wait_for_terminal(&ctx, job_id, POLL_INTERVAL).await?;
        let results = service.get_results(job_id).await.ok();
        let report = serde_json::json!({ "job": status, "results": results });
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| ServiceError::internal_error(format!("Failed to render results: {}", e)))?;
        println!("{}", rendered);
    }

    queue.close();
    pool.shutdown().await;

    tracing::info!(
        requests = cost_tracker.requests(),
        input_tokens = cost_tracker.input_tokens(),
        output_tokens = cost_tracker.output_tokens(),
        "LLM usage"
    );
    Ok(())
}

/// Accept a transcript id or a file to store as a new transcript.
async fn resolve_transcript(store: &FsTranscriptStore, arg: &str) -> ServiceResult<Uuid> {
    if let Ok(id) = Uuid::parse_str(arg) {
        return Ok(id);
    }
    let content = tokio::fs::read_to_string(arg).await.map_err(|e| {
        ServiceError::new(
            ErrorCode::TranscriptNotFound,
            format!("Cannot read transcript file {}: {}", arg, e),
        )
    })?;
    Ok(store.save(&content).await?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
