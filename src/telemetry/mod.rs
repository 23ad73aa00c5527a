//! Telemetry for the relay worker.
//!
//! Structured logging via `tracing` and counters/histograms via the
//! `metrics` facade. Which exporter backs the facade is the operator's
//! choice; the worker only records.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    record_chunks, record_request, record_request_cancelled, record_request_failure,
    record_request_success,
};
