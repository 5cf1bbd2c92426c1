use std::time::Duration;

use crate::retry::{Backoff, RetryConfig};

/// Default page size for paginated folder and wantlist requests.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Request pacing and retry budget applied to one Discogs account.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPolicy {
    /// Minimum gap between two outgoing requests. Zero disables spacing.
    pub min_spacing: Duration,
    /// Upper bound for a single upstream call.
    pub request_timeout: Duration,
    /// Items per page for paginated resources.
    pub page_size: u32,
    pub retry: RetryConfig,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self::discogs_default()
    }
}

impl RequestPolicy {
    /// Authenticated Discogs quota is 60 requests per minute; one request every
    /// five seconds keeps a single poller well under it.
    pub fn discogs_default() -> Self {
        Self {
            min_spacing: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig {
                enabled: true,
                max_retries: 3,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(5),
                    factor: 2.0,
                    max: Duration::from_secs(60),
                    jitter: false,
                },
                rate_limit_cooldown: Duration::from_secs(60),
            },
        }
    }

    /// No spacing and millisecond retries, for offline fixtures.
    pub fn immediate() -> Self {
        Self {
            min_spacing: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig {
                enabled: true,
                max_retries: 3,
                backoff: Backoff::Fixed {
                    delay: Duration::from_millis(1),
                },
                rate_limit_cooldown: Duration::from_millis(1),
            },
        }
    }

    pub fn with_min_spacing(mut self, min_spacing: Duration) -> Self {
        self.min_spacing = min_spacing;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
