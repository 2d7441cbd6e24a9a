//! Client-side request throttling
//!
//! Museum APIs publish per-client request quotas. A [`RateLimiter`] hands out at
//! most `max_requests` permits per window; each permit is returned only once the
//! window that issued it has elapsed.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::debug;

use super::config::RateLimitConfig;
use crate::metrics::record_rate_limit_wait;

/// Request-count rate limiter shared by every clone
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Allow `max_requests` per `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_requests)),
            max_requests,
            window,
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_millis(config.window_ms))
    }

    /// Requests allowed per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for one request slot.
    ///
    /// The permit is held by a background task until the window elapses, so the
    /// quota refills one window after each request rather than all at once.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        let started = Instant::now();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RateLimitError::AcquireError(e.to_string()))?;

        let waited = started.elapsed();
        record_rate_limit_wait(waited);
        if waited > Duration::from_millis(100) {
            debug!(wait_ms = waited.as_millis() as u64, "Rate limit permit acquired after wait");
        }

        let window = self.window;
        tokio::spawn(async move {
            sleep(window).await;
            drop(permit);
        });

        Ok(())
    }

    /// Stop handing out permits; pending and future acquisitions fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Failed to acquire a permit
    #[error("failed to acquire rate limit permit: {0}")]
    AcquireError(String),
}
