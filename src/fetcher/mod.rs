//! Fetch engine: retrying transport, identifier resolution and record streaming

use crate::harvest::rate_limit::RateLimitError;
use futures_util::Stream;
use std::pin::Pin;

pub mod http;
pub mod pagination;
pub mod retry;
pub mod shared_resources;
pub mod stream;

pub use http::{HttpSend, RawResponse, RetryingTransport};
pub use pagination::IdentifierResolver;
pub use retry::{RetryEvent, RetryHook, RetryReason};
pub use stream::{stream_records, ProgressHook};

/// Class of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request timed out
    Timeout,
    /// The connection could not be established
    Connect,
    /// Any other failure while sending or reading the response
    Network,
}

/// Fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Timeout, connection reset or similar failure (retryable)
    #[error("transport error ({kind:?}): {message}")]
    TransientTransport {
        /// Failure class
        kind: TransportErrorKind,
        /// Underlying error message
        message: String,
    },

    /// HTTP 429 or 5xx (retryable)
    #[error("server error: HTTP {status}")]
    TransientServer {
        /// HTTP status code
        status: u16,
    },

    /// Any other non-2xx status
    #[error("server rejected request: HTTP {status}: {body}")]
    PermanentServer {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Payload did not match the expected shape
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The request could not be built
    #[error("request construction error: {0}")]
    RequestConstruction(String),

    /// Cancellation was requested
    #[error("operation cancelled")]
    Cancelled,

    /// Pagination did not terminate within the page limit
    #[error("pagination exceeded {0} pages")]
    PaginationLimit(usize),

    /// A fetch task panicked or was aborted
    #[error("fetch task failed: {0}")]
    TaskFailed(String),

    /// Rate limiter failure
    #[error("rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),
}

impl FetchError {
    /// Whether the transport may retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::TransientTransport { .. } | FetchError::TransientServer { .. }
        )
    }

    /// Whether this error reports cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// HTTP status carried by server errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::TransientServer { status } | FetchError::PermanentServer { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Classify a `reqwest` failure raised while building or sending a request.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return FetchError::RequestConstruction(err.to_string());
        }
        if let Some(status) = err.status() {
            return FetchError::from_status(status.as_u16(), String::new());
        }
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Network
        };
        FetchError::TransientTransport {
            kind,
            message: err.to_string(),
        }
    }

    /// Classify a non-2xx HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || (500..600).contains(&status) {
            FetchError::TransientServer { status }
        } else {
            FetchError::PermanentServer { status, body }
        }
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Lazy, single-pass stream of fetched records
pub type RecordStream<T> = Pin<Box<dyn Stream<Item = FetchResult<T>> + Send>>;
