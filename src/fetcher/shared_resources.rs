//! Process-wide HTTP client
//!
//! Every transport built with [`RetryingTransport::new`](super::RetryingTransport::new)
//! sends through one pooled `reqwest::Client`, so collection clients running side
//! by side reuse connections. Per-request timeouts are applied by each transport;
//! only the connect timeout is fixed here.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

use crate::harvest::config::DEFAULT_CONNECT_TIMEOUT_SECS;

static GLOBAL_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .user_agent(concat!("collection-fetcher/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
});

/// Get the shared HTTP client.
///
/// `reqwest::Client` is reference counted internally, so the clone is cheap and
/// shares the connection pool.
pub fn global_http_client() -> Client {
    GLOBAL_HTTP_CLIENT.clone()
}
