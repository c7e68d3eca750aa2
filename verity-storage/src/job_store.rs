//! In-memory job store

use crate::JobStore;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;
use verity_core::{
    AnalysisJob, AnalysisResults, EntityType, JobStatus, StorageError, TransitionOutcome,
    VerityError, VerityResult,
};

/// Concurrent job store backed by a [`DashMap`].
///
/// Each status write holds the row's shard lock for the duration of the
/// transition, so writes to one job are serialized while different jobs
/// proceed in parallel.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, AnalysisJob>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs currently in `status`.
    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }

    fn update<F>(&self, job_id: Uuid, apply: F) -> VerityResult<TransitionOutcome>
    where
        F: FnOnce(&mut AnalysisJob) -> Result<TransitionOutcome, StorageError>,
    {
        let mut job = self
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| VerityError::job_not_found(job_id))?;
        let from = job.status;
        let outcome = apply(&mut *job)?;
        tracing::debug!(
            job_id = %job_id,
            from = %from,
            to = %job.status,
            outcome = ?outcome,
            "Job status write"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &AnalysisJob) -> VerityResult<()> {
        match self.jobs.entry(job.job_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(VerityError::Storage(StorageError::InsertFailed {
                    entity_type: EntityType::Job,
                    reason: format!("job {} already exists", job.job_id),
                }))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, job_id: Uuid) -> VerityResult<Option<AnalysisJob>> {
        Ok(self.jobs.get(&job_id).map(|job| job.clone()))
    }

    async fn begin_processing(&self, job_id: Uuid) -> VerityResult<TransitionOutcome> {
        self.update(job_id, AnalysisJob::begin_processing)
    }

    async fn complete(
        &self,
        job_id: Uuid,
        results: AnalysisResults,
    ) -> VerityResult<TransitionOutcome> {
        self.update(job_id, |job| job.complete(results, Utc::now()))
    }

    async fn fail(&self, job_id: Uuid, message: &str) -> VerityResult<TransitionOutcome> {
        self.update(job_id, |job| job.fail(message, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_test_utils::assertions::assert_not_found;
    use verity_test_utils::fixtures::{pending_job, sample_results};

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(&job).await.unwrap();

        assert_eq!(store.get(job.job_id).await.unwrap(), Some(job.clone()));
        assert_eq!(store.get(Uuid::now_v7()).await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(&job).await.unwrap();
        let result = store.insert(&job).await;
        assert!(matches!(
            result,
            Err(VerityError::Storage(StorageError::InsertFailed { entity_type: EntityType::Job, .. }))
        ));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(&job).await.unwrap();

        assert_eq!(
            store.begin_processing(job.job_id).await.unwrap(),
            TransitionOutcome::Applied
        );
        assert_eq!(
            store.complete(job.job_id, sample_results()).await.unwrap(),
            TransitionOutcome::Applied
        );

        let stored = store.get(job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(stored.results(), sample_results());
        assert_eq!(store.count_by_status(JobStatus::Completed), 1);
    }

    #[tokio::test]
    async fn test_repeated_fail_is_idempotent() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(&job).await.unwrap();
        store.begin_processing(job.job_id).await.unwrap();

        assert_eq!(
            store.fail(job.job_id, "boom").await.unwrap(),
            TransitionOutcome::Applied
        );
        let first = store.get(job.job_id).await.unwrap().unwrap();
        assert_eq!(
            store.fail(job.job_id, "boom").await.unwrap(),
            TransitionOutcome::Unchanged
        );
        let second = store.get(job.job_id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_terminal_jobs_do_not_regress() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(&job).await.unwrap();
        store.begin_processing(job.job_id).await.unwrap();
        store.fail(job.job_id, "boom").await.unwrap();

        let result = store.begin_processing(job.job_id).await;
        assert!(matches!(
            result,
            Err(VerityError::Storage(StorageError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Processing,
                ..
            }))
        ));
        let result = store.complete(job.job_id, sample_results()).await;
        assert!(result.is_err());
        assert_eq!(
            store.get(job.job_id).await.unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let store = InMemoryJobStore::new();
        let result = store.begin_processing(Uuid::now_v7()).await;
        assert_not_found(&result, EntityType::Job);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_distinct_jobs() {
        let store = std::sync::Arc::new(InMemoryJobStore::new());
        let mut ids = Vec::new();
        for _ in 0..32 {
            let job = pending_job();
            store.insert(&job).await.unwrap();
            ids.push(job.job_id);
        }

        let handles: Vec<_> = ids
            .iter()
            .copied()
            .enumerate()
            .map(|(i, id)| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.begin_processing(id).await.unwrap();
                    if i % 2 == 0 {
                        store.complete(id, AnalysisResults::default()).await.unwrap();
                    } else {
                        store.fail(id, "failed").await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count_by_status(JobStatus::Completed), 16);
        assert_eq!(store.count_by_status(JobStatus::Failed), 16);
    }
}
