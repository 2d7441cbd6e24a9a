//! Cooperative cancellation primitives.
//!
//! A [`CancellationSource`] owns the right to cancel; the [`CancellationToken`]s
//! it hands out can only observe. Tokens are cheap to clone and are threaded
//! through the transport, the identifier resolver and the record stream, each of
//! which polls them at fixed checkpoints rather than being interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CancelState {
    is_cancelled: AtomicBool,
    notify: Notify,
}

/// Owner side of a cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    state: Arc<CancelState>,
}

impl CancellationSource {
    /// Create a new, not-yet-cancelled source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a read-only token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            state: Some(self.state.clone()),
        }
    }

    /// Request cancellation. Wakes every waiter exactly once.
    pub fn cancel(&self) {
        if !self.state.is_cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled.load(Ordering::SeqCst)
    }
}

/// Read-only view of a cancellation flag.
///
/// [`CancellationToken::none`] builds a token that is never cancelled, for
/// callers that have nothing to cancel.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Option<Arc<CancelState>>,
}

impl CancellationToken {
    /// A token that never reports cancellation.
    pub fn none() -> Self {
        Self { state: None }
    }

    /// Whether cancellation has been requested now.
    pub fn is_cancelled(&self) -> bool {
        self.state
            .as_ref()
            .map(|s| s.is_cancelled.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Wait until cancellation is requested. Returns immediately if already set;
    /// never resolves for [`CancellationToken::none`].
    pub async fn cancelled(&self) {
        let Some(state) = &self.state else {
            return std::future::pending::<()>().await;
        };

        // Register interest before checking the flag so a cancel() landing
        // between the check and the await is not missed.
        let notified = state.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if state.is_cancelled.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}
