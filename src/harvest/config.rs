//! Harvest configuration: defaults, retry policy and environment overrides

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of retries after the initial attempt.
/// 5 retries with doubling backoff from 1s waits at most 31s in total.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Default backoff growth factor between consecutive retries.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound for a single backoff wait, in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Overall time allowed for one HTTP request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Time allowed to establish a TCP connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of detail fetches issued per window.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default number of identifiers requested per search page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

const ENV_MAX_RETRIES: &str = "FETCH_MAX_RETRIES";
const ENV_CONCURRENCY: &str = "FETCH_CONCURRENCY";
const ENV_PAGE_SIZE: &str = "FETCH_PAGE_SIZE";
const ENV_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is outside its allowed range
    #[error("invalid configuration: {0}")]
    InvalidValue(String),

    /// An environment variable could not be parsed
    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Raw value found
        value: String,
    },
}

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry (ms)
    pub initial_delay_ms: u64,
    /// Growth factor between retries
    pub multiplier: f64,
    /// Cap for a single wait (ms); `None` leaves delays uncapped
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: Some(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy with explicit values and no delay cap.
    pub fn new(max_retries: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay_ms: initial_delay.as_millis() as u64,
            multiplier,
            max_delay_ms: None,
        }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, 1.0)
    }

    /// Set the per-wait cap.
    pub fn with_max_delay(mut self, max_delay: Option<Duration>) -> Self {
        self.max_delay_ms = max_delay.map(|d| d.as_millis() as u64);
        self
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Wait before retry `attempt` (1-based): `initial_delay * multiplier^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        let nanos = (self.initial_delay().as_nanos() as f64 * factor).round();
        let delay = if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos as u64)
        } else {
            Duration::MAX
        };
        match self.max_delay_ms {
            Some(cap) => delay.min(Duration::from_millis(cap)),
            None => delay,
        }
    }

    /// Reject multipliers below 1.0 or non-finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Optional client-side request throttling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub max_requests: usize,
    /// Window length (ms)
    pub window_ms: u64,
}

/// Settings applied to every request a transport sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Retry behaviour
    pub retry: RetryPolicy,
    /// Timeout for each individual attempt (s)
    pub request_timeout_secs: u64,
    /// Optional throttling
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            rate_limit: None,
        }
    }
}

impl TransportConfig {
    /// Per-attempt timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Throttle to `max_requests` per `window`.
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_limit = Some(RateLimitConfig {
            max_requests,
            window_ms: window.as_millis() as u64,
        });
        self
    }

    /// Validate nested settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        if let Some(limit) = &self.rate_limit {
            if limit.max_requests == 0 || limit.window_ms == 0 {
                return Err(ConfigError::InvalidValue(
                    "rate limit needs non-zero requests and window".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Settings for a complete resolve-then-stream harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Transport settings
    pub transport: TransportConfig,
    /// Detail fetches per window
    pub concurrency: usize,
    /// Identifiers per search page
    pub page_size: u32,
    /// First search page to request
    pub start_page: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            start_page: 1,
        }
    }
}

impl HarvestConfig {
    /// Defaults overridden by `FETCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, ENV_MAX_RETRIES)? {
            config.transport.retry.max_retries = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_CONCURRENCY)? {
            config.concurrency = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_PAGE_SIZE)? {
            config.page_size = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_TIMEOUT_SECS)? {
            config.transport.request_timeout_secs = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the window size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the search page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the first search page.
    pub fn with_start_page(mut self, start_page: u32) -> Self {
        self.start_page = start_page;
        self
    }

    /// Replace transport settings.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Validate every nested setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transport.validate()?;
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value: raw }),
    }
}
