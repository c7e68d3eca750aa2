//! Job queue seam and an in-memory competing-consumer queue
//!
//! Producers publish [`JobMessage`]s as JSON. Consumers receive raw payloads
//! and decode them themselves so that a malformed message can be rejected
//! without stopping the consumer.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use verity_core::{JobMessage, QueueError, VerityResult};

/// Publishing side of the job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, message: &JobMessage) -> VerityResult<()>;
}

/// Consuming side of the job queue.
///
/// Each payload is handed to exactly one consumer.
#[async_trait]
pub trait JobConsumer: Send + Sync {
    /// Wait for the next payload. `None` means the queue is closed and
    /// drained.
    async fn receive(&self) -> Option<String>;
}

/// Bounded in-memory queue backed by a tokio mpsc channel.
///
/// Every consumer shares one receiver, so consumers compete for payloads.
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct InMemoryQueue {
    sender: Arc<Mutex<Option<mpsc::Sender<String>>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
}

impl InMemoryQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::Sender<String>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a raw payload without encoding it.
    ///
    /// Never waits for capacity: a full queue is a publish failure.
    pub async fn publish_raw(&self, payload: impl Into<String>) -> VerityResult<()> {
        let sender = self.sender().clone().ok_or(QueueError::Closed)?;
        sender.try_send(payload.into()).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::PublishFailed {
                reason: format!("queue is full (capacity {})", sender.max_capacity()),
            },
            TrySendError::Closed(_) => QueueError::Closed,
        })?;
        Ok(())
    }

    /// Stop accepting new payloads. Payloads already queued are still
    /// delivered, then consumers see `None`.
    pub fn close(&self) {
        self.sender().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    pub fn consumer(&self) -> Arc<dyn JobConsumer> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn publish(&self, message: &JobMessage) -> VerityResult<()> {
        let payload = message.to_json()?;
        self.publish_raw(payload).await?;
        tracing::debug!(job_id = %message.job_id, "Job message published");
        Ok(())
    }
}

#[async_trait]
impl JobConsumer for InMemoryQueue {
    async fn receive(&self) -> Option<String> {
        self.receiver.lock().await.recv().await
    }
}
