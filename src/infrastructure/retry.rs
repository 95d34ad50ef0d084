//! Bounded retry with exponential backoff for hub round trips.

use crate::config::RetryConfig;
use crate::domain::ports::HubTransport;
use crate::domain::transaction::Action;
use crate::error::{Result, TransportError, VendError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt)
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay, config.max_delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the given attempt (0-indexed): none for the first,
    /// `base_delay * 2^attempt` afterwards, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent.
    ///
    /// Only transient transport errors are retried. Anything else is returned
    /// as [`VendError::Transport`] straight away; running out of attempts gives
    /// [`VendError::TransportExhausted`] with the last cause.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            let delay = self.delay_for_attempt(attempt);
            if !delay.is_zero() {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                sleep(delay).await;
            }

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(attempt = attempt + 1, "Hub request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(attempts = attempt, error = %error, "Retries exhausted");
                        return Err(VendError::TransportExhausted {
                            attempts: attempt,
                            source: error,
                        });
                    }
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "Transient hub error, will retry"
                    );
                }
                Err(error) => {
                    warn!(attempt = attempt + 1, error = %error, "Non-retryable hub error");
                    return Err(VendError::Transport(error));
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Posts `body` for `action`, retrying transient failures per `policy`.
pub async fn send_with_retry(
    transport: &dyn HubTransport,
    policy: &RetryPolicy,
    action: Action,
    body: &[u8],
) -> Result<Vec<u8>> {
    policy.execute(|_| transport.post(action, body)).await
}
