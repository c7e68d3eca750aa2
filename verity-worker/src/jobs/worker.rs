//! Worker Pool
//!
//! Each worker pulls one payload at a time from the shared queue and hands
//! it to the [`JobProcessor`]. A job that panics is recorded as failed and
//! the worker keeps consuming.
//!
//! # Shutdown
//!
//! [`WorkerPool::shutdown`] first asks workers to stop after their current
//! job. Workers still busy when the grace period ends have their job context
//! cancelled, which fails the in-flight job.
//!
//! ```ignore
//! let pool = WorkerPool::spawn(processor, queue.consumer(), &settings.worker);
//! // ...
//! let snapshot = pool.shutdown().await;
//! ```

use super::processor::{JobProcessor, ProcessOutcome};
use crate::queue::JobConsumer;
use futures_util::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use verity_core::{CorrelationId, HealthCheck, JobMessage, RequestContext, WorkerSettings};

const COMPONENT: &str = "worker_pool";

// ============================================================================
// METRICS
// ============================================================================

/// Counters shared by every worker in a pool.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Messages decoded and handed to the processor
    pub jobs_processed: AtomicU64,

    pub jobs_completed: AtomicU64,

    /// Failed jobs, including those that panicked
    pub jobs_failed: AtomicU64,

    pub jobs_panicked: AtomicU64,

    /// Payloads that could not be decoded
    pub messages_rejected: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WorkerMetricsSnapshot {
        WorkerMetricsSnapshot {
            jobs_processed: self.jobs_processed.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_panicked: self.jobs_panicked.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
        }
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerMetricsSnapshot {
    pub jobs_processed: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_panicked: u64,
    pub messages_rejected: u64,
}

// ============================================================================
// PANIC CAPTURE
// ============================================================================

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Record a backtrace for every panic on the panicking thread, then defer to
/// the previous hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

fn take_backtrace() -> String {
    LAST_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| "<backtrace unavailable>".to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// POOL
// ============================================================================

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    cancellation: CancellationToken,
    metrics: Arc<WorkerMetrics>,
    shutdown_grace: Duration,
}

impl WorkerPool {
    /// Spawn `settings.worker_count` workers (at least one) on the current
    /// runtime.
    pub fn spawn(
        processor: Arc<JobProcessor>,
        consumer: Arc<dyn JobConsumer>,
        settings: &WorkerSettings,
    ) -> Self {
        install_panic_hook();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cancellation = CancellationToken::new();
        let metrics = Arc::new(WorkerMetrics::new());
        let count = settings.worker_count.max(1);

        let handles = (0..count)
            .map(|worker_id| {
                let worker = Worker {
                    worker_id,
                    processor: processor.clone(),
                    consumer: consumer.clone(),
                    metrics: metrics.clone(),
                    cancellation: cancellation.clone(),
                };
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect();

        tracing::info!(
            worker_count = count,
            shutdown_grace_secs = settings.shutdown_grace.as_secs(),
            "Worker pool started"
        );

        Self {
            handles,
            shutdown_tx,
            cancellation,
            metrics,
            shutdown_grace: settings.shutdown_grace,
        }
    }

    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        self.metrics.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Report how many workers are still consuming.
    pub fn health(&self) -> HealthCheck {
        let total = self.handles.len();
        let alive = self.handles.iter().filter(|h| !h.is_finished()).count();
        let snapshot = self.metrics.snapshot();

        let check = if alive == total {
            HealthCheck::healthy(COMPONENT)
        } else if alive > 0 {
            HealthCheck::degraded(COMPONENT, format!("{} of {} workers running", alive, total))
        } else {
            HealthCheck::unhealthy(COMPONENT, "no workers running")
        };
        check
            .with_metadata("workers_alive", alive.into())
            .with_metadata("jobs_processed", snapshot.jobs_processed.into())
            .with_metadata("jobs_failed", snapshot.jobs_failed.into())
            .with_metadata("jobs_panicked", snapshot.jobs_panicked.into())
    }

    /// Stop every worker and return the final counters.
    pub async fn shutdown(self) -> WorkerMetricsSnapshot {
        tracing::info!("Worker pool shutting down");
        // Workers may already have exited if the queue closed.
        let _ = self.shutdown_tx.send(true);

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        let mut stragglers = Vec::new();
        for mut handle in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(result) => log_join(result),
                Err(_) => stragglers.push(handle),
            }
        }

        if !stragglers.is_empty() {
            tracing::warn!(
                workers = stragglers.len(),
                grace_secs = self.shutdown_grace.as_secs(),
                "Grace period elapsed, cancelling in-flight jobs"
            );
            self.cancellation.cancel();
            for handle in stragglers {
                log_join(handle.await);
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            jobs_processed = snapshot.jobs_processed,
            jobs_completed = snapshot.jobs_completed,
            jobs_failed = snapshot.jobs_failed,
            jobs_panicked = snapshot.jobs_panicked,
            messages_rejected = snapshot.messages_rejected,
            "Worker pool stopped"
        );
        snapshot
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Worker task ended abnormally");
    }
}

// ============================================================================
// WORKER LOOP
// ============================================================================

struct Worker {
    worker_id: usize,
    processor: Arc<JobProcessor>,
    consumer: Arc<dyn JobConsumer>,
    metrics: Arc<WorkerMetrics>,
    cancellation: CancellationToken,
}

impl Worker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::debug!(worker_id = self.worker_id, "Worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let payload = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }

                payload = self.consumer.receive() => payload,
            };

            match payload {
                Some(payload) => self.handle(&payload).await,
                None => {
                    tracing::info!(worker_id = self.worker_id, "Queue closed");
                    break;
                }
            }
        }

        tracing::debug!(worker_id = self.worker_id, "Worker stopped");
    }

    async fn handle(&self, payload: &str) {
        let message = match JobMessage::from_json(payload) {
            Ok(message) => message,
            Err(e) => {
                WorkerMetrics::incr(&self.metrics.messages_rejected);
                tracing::warn!(
                    worker_id = self.worker_id,
                    error = %e,
                    "Rejected malformed job message"
                );
                return;
            }
        };

        WorkerMetrics::incr(&self.metrics.jobs_processed);
        let ctx = RequestContext::with_cancellation(
            CorrelationId::from(message.job_id),
            self.cancellation.child_token(),
        );

        let result = AssertUnwindSafe(self.processor.process(&ctx, &message))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(ProcessOutcome::Completed)) => {
                WorkerMetrics::incr(&self.metrics.jobs_completed);
            }
            Ok(Ok(ProcessOutcome::Failed)) => {
                WorkerMetrics::incr(&self.metrics.jobs_failed);
            }
            Ok(Ok(ProcessOutcome::Skipped)) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    correlation_id = %ctx.correlation_id(),
                    job_id = %message.job_id,
                    error = %e,
                    "Job processing error"
                );
                WorkerMetrics::incr(&self.metrics.jobs_failed);
                self.record_failure(&message, &format!("Job processing error: {}", e))
                    .await;
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(
                    correlation_id = %ctx.correlation_id(),
                    job_id = %message.job_id,
                    worker_id = self.worker_id,
                    panic = %reason,
                    backtrace = %take_backtrace(),
                    "Job panicked"
                );
                WorkerMetrics::incr(&self.metrics.jobs_panicked);
                WorkerMetrics::incr(&self.metrics.jobs_failed);
                self.record_failure(&message, &format!("Job panicked: {}", reason))
                    .await;
            }
        }
    }

    /// Best-effort failure write after an error escaped the processor.
    async fn record_failure(&self, message: &JobMessage, reason: &str) {
        if let Err(e) = self.processor.jobs().fail(message.job_id, reason).await {
            tracing::error!(
                job_id = %message.job_id,
                error = %e,
                "Failed to record job failure"
            );
        }
    }
}
