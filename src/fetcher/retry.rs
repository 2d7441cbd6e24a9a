//! Retry telemetry: why a request is being retried and how to describe it.
//!
//! The transport emits one [`RetryEvent`] immediately before every backoff wait.
//! [`RetryContext`] turns the same information into the log lines the transport
//! writes, so every client reports retries with identical wording.

use std::sync::Arc;
use std::time::Duration;

use super::{FetchError, TransportErrorKind};

/// Why a request is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryReason {
    /// Retryable HTTP status (429 or 5xx)
    HttpStatus(u16),
    /// Request timed out
    Timeout,
    /// Connection could not be established
    Connect,
    /// Other transport failure
    Network,
}

impl RetryReason {
    /// Derive the retry reason for a transient error; `None` for permanent ones.
    pub fn from_error(err: &FetchError) -> Option<Self> {
        match err {
            FetchError::TransientServer { status } => Some(Self::HttpStatus(*status)),
            FetchError::TransientTransport { kind, .. } => Some(match kind {
                TransportErrorKind::Timeout => Self::Timeout,
                TransportErrorKind::Connect => Self::Connect,
                TransportErrorKind::Network => Self::Network,
            }),
            _ => None,
        }
    }

    /// User-friendly description used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::HttpStatus(code) => match code {
                429 => "rate limit exceeded",
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::Timeout => "network timeout",
            Self::Connect => "connection failed",
            Self::Network => "network error",
        }
    }

    /// Suggested remediation once retries are exhausted.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::HttpStatus(429) => "Reduce concurrency or wait before trying again",
            Self::HttpStatus(_) => "The collection API may be experiencing issues, try again later",
            Self::Timeout => "Check your network connection or raise the request timeout",
            Self::Connect => "Verify internet connectivity and DNS resolution",
            Self::Network => "Check network connectivity and try again",
        }
    }

    /// Metric label for this reason.
    pub fn label(&self) -> String {
        match self {
            Self::HttpStatus(code) => format!("http_{code}"),
            Self::Timeout => "timeout".to_string(),
            Self::Connect => "connect".to_string(),
            Self::Network => "network".to_string(),
        }
    }
}

/// One retry about to happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryEvent {
    /// 1-based retry index
    pub attempt: u32,
    /// Wait before the retry
    pub delay: Duration,
    /// Failure that triggered the retry
    pub reason: RetryReason,
}

/// Callback notified of every [`RetryEvent`]
pub type RetryHook = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current retry (1-based)
    pub attempt: u32,
    /// Maximum number of retries configured
    pub max_retries: u32,
    /// Failure that triggered the retry
    pub reason: RetryReason,
    /// Backoff until the next attempt
    pub backoff: Duration,
    /// Original error message
    pub error_message: String,
    /// URL that failed
    pub endpoint: String,
}

impl RetryContext {
    /// Build a context from an emitted event.
    pub fn from_event(
        event: &RetryEvent,
        max_retries: u32,
        error_message: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            attempt: event.attempt,
            max_retries,
            reason: event.reason,
            backoff: event.delay,
            error_message: error_message.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Standardized retry message with attempt counters.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt,
            self.max_retries,
            self.reason.description(),
            self.backoff.as_secs_f64(),
            self.endpoint
        )
    }

    /// Message for a request that succeeded after retrying.
    pub fn format_success(&self) -> String {
        format!(
            "Retry attempt {}/{} succeeded ({})",
            self.attempt, self.max_retries, self.endpoint
        )
    }

    /// Final failure summary with a remediation hint.
    pub fn format_failure(&self) -> String {
        [
            format!("[FAILED] Request failed after {} retries", self.max_retries),
            format!("  Last error: {}", self.error_message),
            format!("  Endpoint: {}", self.endpoint),
            format!("  Suggestion: {}", self.reason.suggestion()),
        ]
        .join("\n")
    }
}
