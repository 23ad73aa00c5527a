//! Metric recording helpers.

use metrics::{counter, histogram};

/// A generation request arrived (before validation).
pub fn record_request() {
    counter!("genrelay_requests_total").increment(1);
}

/// Chunks forwarded to a client.
pub fn record_chunks(count: u64) {
    counter!("genrelay_chunks_total").increment(count);
}

/// A session completed cleanly.
pub fn record_request_success(latency_ms: f64) {
    counter!("genrelay_requests_completed_total").increment(1);
    histogram!("genrelay_request_latency_ms").record(latency_ms);
}

/// A session failed; `reason` is a low-cardinality class, not the message.
pub fn record_request_failure(reason: &'static str) {
    counter!("genrelay_request_failures_total", "reason" => reason).increment(1);
}

/// The client abandoned a session. Expected, not an error.
pub fn record_request_cancelled() {
    counter!("genrelay_requests_cancelled_total").increment(1);
}
