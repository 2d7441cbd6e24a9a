//! Observability metrics for the fetch engine
//!
//! Everything here goes through the `metrics` facade. The library never installs
//! a recorder; an application that wants the numbers installs an exporter of its
//! choice, otherwise every call is a no-op.
//!
//! | metric | type | labels |
//! |---|---|---|
//! | `fetch_requests_total` | counter | `status`, `attempt` |
//! | `fetch_request_duration_seconds` | histogram | |
//! | `fetch_retries_total` | counter | `reason` |
//! | `fetch_retry_backoff_seconds` | histogram | |
//! | `fetch_rate_limit_wait_seconds` | histogram | |
//! | `fetch_records_total` | counter | |
//! | `harvests_completed_total` / `harvests_failed_total` | counter | |

use metrics::{counter, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::fetcher::RetryEvent;

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of a single HTTP attempt
pub struct RequestMetrics {
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl RequestMetrics {
    /// Start recording attempt `attempt` (0 for the initial try).
    pub fn start(url: &str, attempt: u32) -> Self {
        let correlation_id = generate_correlation_id();
        debug!(correlation_id = %correlation_id, url = %url, attempt, "Sending request");
        Self {
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record a response with an HTTP status.
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();
        counter!(
            "fetch_requests_total",
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("fetch_request_duration_seconds").record(duration.as_secs_f64());

        if status_code == 429 {
            warn!(
                correlation_id = %self.correlation_id,
                attempt = self.attempt,
                duration_ms = duration.as_millis() as u64,
                "Rate limit response (429) received"
            );
        }
    }

    /// Record a failure that produced no HTTP status.
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();
        counter!(
            "fetch_requests_total",
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("fetch_request_duration_seconds").record(duration.as_secs_f64());
    }

    /// Correlation ID for this attempt.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a retry about to wait out its backoff.
pub fn record_retry(event: &RetryEvent) {
    counter!("fetch_retries_total", "reason" => event.reason.label()).increment(1);
    histogram!("fetch_retry_backoff_seconds").record(event.delay.as_secs_f64());
}

/// Record time spent waiting on the rate limiter.
pub fn record_rate_limit_wait(waited: Duration) {
    histogram!("fetch_rate_limit_wait_seconds").record(waited.as_secs_f64());
}

/// Record one record yielded by a stream.
pub fn record_record_fetched() {
    counter!("fetch_records_total").increment(1);
}

/// Lifecycle of one harvest
pub struct HarvestMetrics {
    label: String,
    start_time: Instant,
}

impl HarvestMetrics {
    /// Start tracking a harvest.
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!(harvest = %label, "Harvest started");
        Self {
            label,
            start_time: Instant::now(),
        }
    }

    /// Record successful identifier resolution.
    pub fn record_resolved(&self, identifiers: usize) {
        info!(
            harvest = %self.label,
            identifiers,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "Identifiers resolved"
        );
    }

    /// Record a finished harvest.
    pub fn record_success(&self, records: usize) {
        counter!("harvests_completed_total").increment(1);
        info!(
            harvest = %self.label,
            records,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Harvest completed"
        );
    }

    /// Record a failed harvest.
    pub fn record_failure(&self, error: &str) {
        counter!("harvests_failed_total").increment(1);
        error!(
            harvest = %self.label,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Harvest failed"
        );
    }
}
