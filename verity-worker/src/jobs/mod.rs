//! Queue consumers
//!
//! - `processor`: drives one job message to a terminal status
//! - `worker`: the worker pool that feeds messages to the processor
//!
//! # Usage
//!
//! ```ignore
//! use verity_worker::jobs::{JobProcessor, WorkerPool};
//!
//! let processor = Arc::new(JobProcessor::new(jobs, transcripts, pipeline));
//! let pool = WorkerPool::spawn(processor, queue.consumer(), &config.worker);
//!
//! // On shutdown
//! let metrics = pool.shutdown().await;
//! ```

pub mod processor;
pub mod worker;

pub use processor::{JobProcessor, ProcessOutcome};
pub use worker::{WorkerMetrics, WorkerMetricsSnapshot, WorkerPool};
