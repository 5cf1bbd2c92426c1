//! Retry loop with fixed and exponential backoff.
//!
//! Every upstream call goes through [`retry_with_backoff`]. The caller
//! classifies each failure as fatal, transient (exponential backoff) or
//! rate-limited (fixed cool-down).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(5),
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Calculate the delay for a given retry attempt (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt.min(i32::MAX as u32) as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds.max(0.0));

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Give up immediately.
    Fatal,
    /// Retry after the exponential backoff delay.
    Transient,
    /// Retry after the fixed rate-limit cool-down.
    RateLimited,
}

/// Configuration for the automatic retry mechanism.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Enables or disables the retry mechanism.
    pub enabled: bool,
    /// The maximum number of retries to attempt.
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Backoff used for transient failures (network, timeout, 5xx).
    pub backoff: Backoff,
    /// Fixed wait after a `429` before retrying the same request.
    pub rate_limit_cooldown: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
            rate_limit_cooldown: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Disable retries.
    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry `attempt` (0-based) for a failure of class `class`.
    /// `None` means the failure must not be retried.
    pub fn delay_for(&self, class: RetryClass, attempt: u32) -> Option<Duration> {
        if !self.enabled || attempt >= self.max_retries {
            return None;
        }

        match class {
            RetryClass::Fatal => None,
            RetryClass::Transient => Some(self.backoff.delay(attempt)),
            RetryClass::RateLimited => Some(self.rate_limit_cooldown),
        }
    }
}

/// Runs `operation` until it succeeds, fails fatally, or runs out of retries.
///
/// `operation` receives the 0-based attempt number. The last error is returned
/// unchanged when retries are exhausted.
pub async fn retry_with_backoff<T, E, Op, Fut, Classify>(
    config: &RetryConfig,
    label: &str,
    classify: Classify,
    mut operation: Op,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Classify: Fn(&E) -> RetryClass,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let class = classify(&error);
                let Some(delay) = config.delay_for(class, attempt) else {
                    return Err(error);
                };

                attempt += 1;
                warn!(
                    request = label,
                    retry = attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "retrying upstream request"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
