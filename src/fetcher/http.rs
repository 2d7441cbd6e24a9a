//! Retrying HTTP transport shared by every collection client
//!
//! Provides one place for:
//! - Request execution with a per-attempt timeout
//! - Failure classification (transient vs permanent)
//! - Exponential backoff with retry notifications
//! - Optional client-side rate limiting
//! - Cancellation checkpoints before every attempt and during every backoff

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Request, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::retry::{RetryContext, RetryEvent, RetryHook, RetryReason};
use super::shared_resources::global_http_client;
use super::{FetchError, FetchResult};
use crate::cancellation::CancellationToken;
use crate::harvest::config::TransportConfig;
use crate::harvest::rate_limit::RateLimiter;
use crate::metrics::{record_retry, RequestMetrics};

/// Bytes of an error body kept for diagnostics
const ERROR_BODY_LIMIT: usize = 512;

/// Status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
}

impl RawResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one fully built request and returns the raw response.
///
/// Implemented for `reqwest::Client`; other implementations let tests script
/// responses without a server.
#[async_trait]
pub trait HttpSend: Send + Sync {
    /// Send `request` once, without retrying.
    async fn send(&self, request: Request) -> FetchResult<RawResponse>;
}

#[async_trait]
impl HttpSend for Client {
    async fn send(&self, request: Request) -> FetchResult<RawResponse> {
        let response = self
            .execute(request)
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        Ok(RawResponse { status, body })
    }
}

/// Executes logical requests with classification, backoff and cancellation
#[derive(Clone)]
pub struct RetryingTransport {
    client: Client,
    sender: Arc<dyn HttpSend>,
    config: TransportConfig,
    rate_limiter: Option<RateLimiter>,
    retry_hook: Option<RetryHook>,
    cancellation: CancellationToken,
}

impl RetryingTransport {
    /// Transport over the shared HTTP client.
    pub fn new(config: TransportConfig) -> Self {
        Self::with_client(global_http_client(), config)
    }

    /// Transport over a caller-supplied client.
    pub fn with_client(client: Client, config: TransportConfig) -> Self {
        let sender: Arc<dyn HttpSend> = Arc::new(client.clone());
        Self::build(client, sender, config)
    }

    /// Transport that builds requests with the shared client but sends them
    /// through `sender`.
    pub fn with_sender(sender: Arc<dyn HttpSend>, config: TransportConfig) -> Self {
        Self::build(global_http_client(), sender, config)
    }

    fn build(client: Client, sender: Arc<dyn HttpSend>, config: TransportConfig) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::from_config);
        Self {
            client,
            sender,
            config,
            rate_limiter,
            retry_hook: None,
            cancellation: CancellationToken::none(),
        }
    }

    /// Notify `hook` before every backoff wait.
    pub fn with_retry_hook(mut self, hook: RetryHook) -> Self {
        self.retry_hook = Some(hook);
        self
    }

    /// Observe `token` at every checkpoint.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Share an existing rate limiter instead of the configured one.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Retries allowed after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.config.retry.max_retries
    }

    /// GET `url` with `query` and decode the JSON body.
    pub async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> FetchResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute(|client| client.get(url).query(query)).await
    }

    /// Execute one logical request and decode its JSON body as `T`.
    ///
    /// `build_request` is called once per attempt, so it must be repeatable.
    ///
    /// # Errors
    /// Transient failures are surfaced after `max_retries` retries; permanent
    /// failures, decoding failures and cancellation are surfaced immediately.
    pub async fn execute<T, F>(&self, build_request: F) -> FetchResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let raw = self.execute_raw(build_request).await?;
        serde_json::from_slice(&raw.body)
            .map_err(|e| FetchError::Decoding(format!("failed to deserialize response: {e}")))
    }

    /// Execute one logical request and return the successful raw response.
    pub async fn execute_raw<F>(&self, build_request: F) -> FetchResult<RawResponse>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let policy = &self.config.retry;
        let mut last_retry: Option<RetryContext> = None;

        for attempt in 0..=policy.max_retries {
            if self.cancellation.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            if let Some(limiter) = &self.rate_limiter {
                tokio::select! {
                    biased;
                    _ = self.cancellation.cancelled() => return Err(FetchError::Cancelled),
                    permit = limiter.acquire() => permit?,
                }
            }

            let request = build_request(&self.client)
                .timeout(self.config.request_timeout())
                .build()
                .map_err(|e| FetchError::RequestConstruction(e.to_string()))?;
            let url = request.url().to_string();

            let metrics = RequestMetrics::start(&url, attempt);
            let error = match self.sender.send(request).await {
                Ok(raw) => {
                    metrics.record_complete(raw.status);
                    if raw.is_success() {
                        if let Some(ctx) = &last_retry {
                            info!("{}", ctx.format_success());
                        }
                        return Ok(raw);
                    }
                    let end = raw.body.len().min(ERROR_BODY_LIMIT);
                    FetchError::from_status(raw.status, String::from_utf8_lossy(&raw.body[..end]).into_owned())
                }
                Err(e) => {
                    metrics.record_network_error();
                    e
                }
            };

            let Some(reason) = RetryReason::from_error(&error) else {
                debug!(url = %url, error = %error, "Permanent failure, not retrying");
                return Err(error);
            };

            if attempt == policy.max_retries {
                if let Some(ctx) = last_retry.as_mut() {
                    ctx.error_message = error.to_string();
                    warn!("{}", ctx.format_failure());
                }
                return Err(error);
            }

            if self.cancellation.is_cancelled() {
                debug!(url = %url, error = %error, "Cancelled after failed attempt, not retrying");
                return Err(FetchError::Cancelled);
            }

            let retry = attempt + 1;
            let event = RetryEvent {
                attempt: retry,
                delay: policy.backoff(retry),
                reason,
            };
            let ctx = RetryContext::from_event(&event, policy.max_retries, error.to_string(), url);
            warn!("{}", ctx.format_retry());
            record_retry(&event);
            if let Some(hook) = &self.retry_hook {
                hook(&event);
            }
            last_retry = Some(ctx);

            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(event.delay) => {}
            }
        }

        // The loop returns on every path of its final iteration.
        Err(FetchError::Cancelled)
    }
}
