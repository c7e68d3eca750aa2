//! Worker pool scenarios: full job flow, failure policy, panic isolation,
//! redelivery, and shutdown.

mod support;

use std::time::Duration;
use support::*;
use verity_agents::{FactChecker, Summarizer};
use verity_core::{HealthStatus, JobStatus, Verdict, WorkerSettings};
use verity_llm::build_search_query;
use verity_storage::JobStore;
use verity_test_utils::assertions::assert_fact_check_valid;
use verity_test_utils::fixtures::{nasa_snippets, nasa_verdict_reply, sample_transcript, NASA_CLAIM};
use verity_test_utils::{Reply, ScriptedCompletionProvider, StaticSearchProvider};
use verity_worker::{ErrorCode, JobQueue};

#[tokio::test]
async fn test_job_completes_with_fact_checks() {
    let llm = base_llm()
        .on_prompt_containing(EXTRACTION_MARKER, Reply::text(format!("1. {}", NASA_CLAIM)))
        .on_prompt_containing(VERDICT_MARKER, Reply::text(nasa_verdict_reply()));
    let search =
        StaticSearchProvider::new().with_results(&build_search_query(NASA_CLAIM), nasa_snippets());
    let h = start(llm, search, single_worker());

    let job_id = h.submit_sample().await;
    let view = h.finished(job_id).await;
    assert_eq!(view.status, JobStatus::Completed);
    assert!(view.completed_at.is_some());
    assert!(view.error_message.is_none());

    let results = h.service.get_results(job_id).await.unwrap();
    assert_eq!(results.summary.as_deref(), Some(SUMMARY));
    assert_eq!(results.takeaways.len(), 2);
    assert_eq!(results.fact_checks.len(), 1);
    assert_eq!(results.fact_checks[0].verdict, Verdict::True);
    assert_fact_check_valid(&results.fact_checks[0]);

    let snapshot = h.pool.shutdown().await;
    assert_eq!(snapshot.jobs_processed, 1);
    assert_eq!(snapshot.jobs_completed, 1);
}

#[tokio::test]
async fn test_summarizer_failure_fails_job() {
    let llm = ScriptedCompletionProvider::new()
        .on_caller(Summarizer::NAME, Reply::api_error("invalid request"));
    let h = start(llm, StaticSearchProvider::new(), single_worker());

    let job_id = h.submit_sample().await;
    let view = h.finished(job_id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error_message.unwrap().contains("invalid request"));

    let job = h.jobs.get(job_id).await.unwrap().unwrap();
    assert!(job.takeaways.is_empty());
    assert!(job.fact_checks.is_empty());

    let err = h.service.get_results(job_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResultsNotReady);

    let snapshot = h.pool.shutdown().await;
    assert_eq!(snapshot.jobs_failed, 1);
}

#[tokio::test]
async fn test_fact_checker_failure_still_completes() {
    let llm = base_llm().on_caller(FactChecker::NAME, Reply::api_error("claim extraction broke"));
    let h = start(llm, StaticSearchProvider::new(), single_worker());

    let job_id = h.submit_sample().await;
    assert_eq!(h.finished(job_id).await.status, JobStatus::Completed);

    let results = h.service.get_results(job_id).await.unwrap();
    assert_eq!(results.summary.as_deref(), Some(SUMMARY));
    assert_eq!(results.takeaways.len(), 2);
    assert!(results.fact_checks.is_empty());
}

#[tokio::test]
async fn test_panicking_job_is_isolated() {
    let llm = ScriptedCompletionProvider::new()
        .on_prompt_containing("EXPLODE-ME", Reply::Panic("stage exploded".to_string()))
        .on_caller(Summarizer::NAME, Reply::text(SUMMARY))
        .on_caller(
            verity_agents::TakeawayExtractor::NAME,
            Reply::text(TAKEAWAYS),
        );
    let h = start(llm, StaticSearchProvider::new(), single_worker());

    let doomed = h
        .submit(&format!("{} EXPLODE-ME", sample_transcript()))
        .await;
    let healthy = h.submit_sample().await;

    let doomed_view = h.finished(doomed).await;
    assert_eq!(doomed_view.status, JobStatus::Failed);
    assert_eq!(
        doomed_view.error_message.as_deref(),
        Some("Job panicked: stage exploded")
    );
    assert!(doomed_view.completed_at.is_some());

    // The same worker went on to process the next job.
    assert_eq!(h.finished(healthy).await.status, JobStatus::Completed);
    assert_eq!(h.pool.health().status, HealthStatus::Healthy);

    let snapshot = h.pool.shutdown().await;
    assert_eq!(snapshot.jobs_panicked, 1);
    assert_eq!(snapshot.jobs_failed, 1);
    assert_eq!(snapshot.jobs_completed, 1);
}

#[tokio::test]
async fn test_malformed_message_is_skipped() {
    let h = start(base_llm(), StaticSearchProvider::new(), single_worker());

    h.queue.publish_raw("{not json").await.unwrap();
    let job_id = h.submit_sample().await;
    assert_eq!(h.finished(job_id).await.status, JobStatus::Completed);

    let snapshot = h.pool.shutdown().await;
    assert_eq!(snapshot.messages_rejected, 1);
    assert_eq!(snapshot.jobs_processed, 1);
}

#[tokio::test]
async fn test_redelivered_terminal_job_is_skipped() {
    let h = start(base_llm(), StaticSearchProvider::new(), single_worker());

    let first = h.submit_sample().await;
    let completed = h.finished(first).await;
    assert_eq!(completed.status, JobStatus::Completed);
    let before = h.jobs.get(first).await.unwrap().unwrap();

    // Redeliver, then queue a fresh job behind it on the single worker.
    h.queue.publish(&before.message()).await.unwrap();
    let second = h.submit_sample().await;
    assert_eq!(h.finished(second).await.status, JobStatus::Completed);

    assert_eq!(h.jobs.get(first).await.unwrap().unwrap(), before);
    assert_eq!(h.llm.calls_by(Summarizer::NAME), 2);
}

#[tokio::test]
async fn test_jobs_spread_across_workers() {
    let settings = WorkerSettings {
        worker_count: 3,
        ..single_worker()
    };
    let h = start(base_llm(), StaticSearchProvider::new(), settings);
    assert_eq!(h.pool.worker_count(), 3);

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(h.submit_sample().await);
    }
    for id in &ids {
        assert_eq!(h.finished(*id).await.status, JobStatus::Completed);
    }
    assert_eq!(h.jobs.count_by_status(JobStatus::Completed), 6);

    let snapshot = h.pool.shutdown().await;
    assert_eq!(snapshot.jobs_completed, 6);
}

#[tokio::test]
async fn test_shutdown_cancels_stuck_job_after_grace() {
    let llm = ScriptedCompletionProvider::new().on_caller(Summarizer::NAME, Reply::Hang);
    let settings = WorkerSettings {
        shutdown_grace: Duration::from_millis(200),
        ..single_worker()
    };
    let h = start(llm, StaticSearchProvider::new(), settings);

    let job_id = h.submit_sample().await;
    h.processing(job_id).await;

    let snapshot = h.pool.shutdown().await;
    assert_eq!(snapshot.jobs_failed, 1);

    let job = h.jobs.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("cancelled"));
}

#[tokio::test]
async fn test_closed_queue_stops_workers() {
    let h = start(base_llm(), StaticSearchProvider::new(), single_worker());
    let job_id = h.submit_sample().await;
    assert_eq!(h.finished(job_id).await.status, JobStatus::Completed);

    h.queue.close();
    for _ in 0..100 {
        if h.pool.health().status == HealthStatus::Unhealthy {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.pool.health().status, HealthStatus::Unhealthy);

    let err = h.service.create_job(
        &verity_core::RequestContext::new(),
        h.transcripts.insert(sample_transcript()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::AnalysisCreationError);
}
