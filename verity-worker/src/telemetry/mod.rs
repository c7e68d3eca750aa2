//! Verity Telemetry - Logging Setup
//!
//! Structured JSON logs through `tracing-subscriber`. Every crate emits
//! `tracing` events; the binary installs the subscriber once at startup.

pub mod tracer;

pub use tracer::{init_tracer, resolve_filter, TelemetryConfig, DEFAULT_FILTER};
