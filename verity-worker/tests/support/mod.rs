//! Shared harness for worker integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use verity_agents::{AnalysisPipeline, Summarizer, TakeawayExtractor};
use verity_core::{AgentLimits, JobStatus, RequestContext, WorkerSettings};
use verity_storage::{InMemoryJobStore, InMemoryTranscriptStore};
use verity_test_utils::fixtures::sample_transcript;
use verity_test_utils::{Reply, ScriptedCompletionProvider, StaticSearchProvider};
use verity_worker::{InMemoryQueue, JobProcessor, JobService, JobStatusView, WorkerPool};

pub const SUMMARY: &str = "Hosts discuss the 2026 Mars mission and falling launch costs.";
pub const TAKEAWAYS: &str =
    "1. NASA targets 2026 for its next Mars launch\n2. Launch costs keep falling";

/// Marker present only in the claim-extraction prompt.
pub const EXTRACTION_MARKER: &str = "FACTUAL CLAIMS:";

/// Marker present only in the verdict prompt.
pub const VERDICT_MARKER: &str = "SEARCH RESULTS:";

pub struct Harness {
    pub service: JobService,
    pub jobs: Arc<InMemoryJobStore>,
    pub transcripts: Arc<InMemoryTranscriptStore>,
    pub queue: InMemoryQueue,
    pub pool: WorkerPool,
    pub llm: Arc<ScriptedCompletionProvider>,
    pub search: Arc<StaticSearchProvider>,
}

/// Summarizer and takeaway replies that always succeed.
pub fn base_llm() -> ScriptedCompletionProvider {
    ScriptedCompletionProvider::new()
        .on_caller(Summarizer::NAME, Reply::text(SUMMARY))
        .on_caller(TakeawayExtractor::NAME, Reply::text(TAKEAWAYS))
}

pub fn single_worker() -> WorkerSettings {
    WorkerSettings {
        worker_count: 1,
        queue_capacity: 32,
        shutdown_grace: Duration::from_secs(5),
    }
}

pub fn start(
    llm: ScriptedCompletionProvider,
    search: StaticSearchProvider,
    settings: WorkerSettings,
) -> Harness {
    let llm = Arc::new(llm);
    let search = Arc::new(search);
    let jobs = Arc::new(InMemoryJobStore::new());
    let transcripts = Arc::new(InMemoryTranscriptStore::new());
    let queue = InMemoryQueue::new(settings.queue_capacity);

    let limits = AgentLimits {
        claim_delay: Duration::ZERO,
        ..AgentLimits::default()
    };
    let pipeline = AnalysisPipeline::builder(llm.clone(), search.clone())
        .limits(limits)
        .build();
    let processor = Arc::new(JobProcessor::new(
        jobs.clone(),
        transcripts.clone(),
        Arc::new(pipeline),
    ));
    let pool = WorkerPool::spawn(processor, queue.consumer(), &settings);
    let service = JobService::new(jobs.clone(), transcripts.clone(), Arc::new(queue.clone()));

    Harness {
        service,
        jobs,
        transcripts,
        queue,
        pool,
        llm,
        search,
    }
}

impl Harness {
    /// Store `content` and create a job for it.
    pub async fn submit(&self, content: &str) -> Uuid {
        let transcript_id = self.transcripts.insert(content);
        self.service
            .create_job(&RequestContext::new(), transcript_id)
            .await
            .unwrap()
            .job_id
    }

    pub async fn submit_sample(&self) -> Uuid {
        self.submit(&sample_transcript()).await
    }

    /// Wait for a terminal status, failing the test after ten seconds.
    pub async fn finished(&self, job_id: Uuid) -> JobStatusView {
        tokio::time::timeout(
            Duration::from_secs(10),
            self.service
                .wait_for_terminal(&RequestContext::new(), job_id, Duration::from_millis(10)),
        )
        .await
        .expect("job did not finish in time")
        .unwrap()
    }

    /// Wait until a worker has picked the job up.
    pub async fn processing(&self, job_id: Uuid) {
        for _ in 0..1000 {
            let view = self.service.get_status(job_id).await.unwrap();
            if view.status == JobStatus::Processing {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never started processing", job_id);
    }
}
