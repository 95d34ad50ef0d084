//! Startup configuration for the hub client.
//!
//! Everything here is read once at process start and never mutated. Missing
//! credentials or an unusable endpoint are reported as
//! [`VendError::Configuration`] before any request is accepted.

pub use crate::domain::signer::Credentials;
use crate::error::{Result, VendError};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Retry policy settings for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay * 2^n`.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub endpoint: String,
    pub credentials: Credentials,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl HubConfig {
    /// Creates a configuration with the default timeout and retry settings.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Hub service URL. Checked by [`HubConfig::validate`], not here.
    /// * `credentials` - Vendor account used to sign every request.
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets attempt count and backoff bounds.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Rejects a missing or non-HTTP endpoint, a zero timeout and zero attempts.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(VendError::Configuration("hub endpoint is not set".to_string()));
        }
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(VendError::Configuration(format!(
                "hub endpoint must be an http(s) URL: {endpoint}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(VendError::Configuration("timeout must be positive".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(VendError::Configuration(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(VendError::Configuration(
                "backoff base delay exceeds the maximum delay".to_string(),
            ));
        }
        Ok(())
    }
}
