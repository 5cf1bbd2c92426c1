//! Account-wide request pacing and quota bookkeeping.
//!
//! Discogs reports its per-minute quota in every response:
//!
//! | Header | Meaning |
//! |--------|---------|
//! | `X-Discogs-Ratelimit` | requests allowed per window |
//! | `X-Discogs-Ratelimit-Used` | requests used in the current window |
//! | `X-Discogs-Ratelimit-Remaining` | requests left in the current window |
//!
//! The quota belongs to the account, so one [`RateLimiter`] is shared by every
//! fetcher, the coordinator and bulk exports.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::Quota;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::policy::RequestPolicy;
use crate::UtcDateTime;

pub const HEADER_TOTAL: &str = "x-discogs-ratelimit";
pub const HEADER_USED: &str = "x-discogs-ratelimit-used";
pub const HEADER_REMAINING: &str = "x-discogs-ratelimit-remaining";

/// Quota assumed before the first response arrives.
pub const DEFAULT_QUOTA_TOTAL: u32 = 60;

type SpacingLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Quota counters as last reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub total: u32,
    pub used: u32,
    pub remaining: u32,
    pub exceeded: bool,
    pub last_updated: Option<UtcDateTime>,
    pub exceeded_at: Option<UtcDateTime>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            total: DEFAULT_QUOTA_TOTAL,
            used: 0,
            remaining: DEFAULT_QUOTA_TOTAL,
            exceeded: false,
            last_updated: None,
            exceeded_at: None,
        }
    }
}

impl RateLimitState {
    /// Remaining budget, forced to zero while a 429 is outstanding.
    pub fn effective_remaining(&self) -> u32 {
        if self.exceeded {
            0
        } else {
            self.remaining
        }
    }
}

/// Read model for observers that need to tell "rate limited" from "offline".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub exceeded: bool,
    pub total: u32,
    pub used: u32,
    pub remaining: u32,
    pub percent_used: Option<f64>,
    pub last_updated: Option<UtcDateTime>,
    pub reset_at: Option<UtcDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QuotaHeaders {
    total: u32,
    used: u32,
    remaining: u32,
}

/// Shared limiter: fixed minimum spacing between requests plus quota tracking.
pub struct RateLimiter {
    spacing: Option<SpacingLimiter>,
    min_spacing: Duration,
    cooldown: Duration,
    state: Mutex<RateLimitState>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_spacing", &self.min_spacing)
            .field("cooldown", &self.cooldown)
            .field("state", &self.state())
            .finish()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_policy(&RequestPolicy::discogs_default())
    }
}

impl RateLimiter {
    /// `min_spacing` of zero disables pacing; `cooldown` is the 429 reset window.
    pub fn new(min_spacing: Duration, cooldown: Duration) -> Self {
        // Burst of one: every request after the first waits a full period.
        let spacing = Quota::with_period(min_spacing).map(governor::RateLimiter::direct);
        Self {
            spacing,
            min_spacing,
            cooldown,
            state: Mutex::new(RateLimitState::default()),
        }
    }

    pub fn from_policy(policy: &RequestPolicy) -> Self {
        Self::new(policy.min_spacing, policy.retry.rate_limit_cooldown)
    }

    /// Waits until the minimum spacing since the previous request has elapsed.
    pub async fn before_request(&self) {
        if let Some(spacing) = &self.spacing {
            if spacing.check().is_err() {
                debug!(
                    spacing_ms = self.min_spacing.as_millis() as u64,
                    "rate limiting: waiting for request slot"
                );
                spacing.until_ready().await;
            }
        }
    }

    /// Folds quota headers and the status code of a response into the state.
    ///
    /// Missing or malformed headers leave the counters untouched.
    pub fn on_response(&self, headers: &BTreeMap<String, String>, status: u16) {
        let now = UtcDateTime::now();
        let mut state = self.lock();

        match parse_quota_headers(headers) {
            Ok(Some(quota)) => {
                state.total = quota.total;
                state.used = quota.used;
                state.remaining = quota.remaining;
                state.last_updated = Some(now);
                debug!(
                    used = quota.used,
                    total = quota.total,
                    remaining = quota.remaining,
                    "discogs rate limit"
                );
            }
            Ok(None) => debug!(status, "response carried no rate limit headers"),
            Err(reason) => warn!(status, %reason, "failed to parse rate limit headers"),
        }

        if status == 429 {
            if !state.exceeded {
                warn!("discogs rate limit exceeded");
                state.exceeded_at = Some(now);
            }
            state.exceeded = true;
            state.remaining = 0;
            state.last_updated = Some(now);
        } else if (200..300).contains(&status) && state.exceeded {
            info!(remaining = state.remaining, "discogs rate limit cleared");
            state.exceeded = false;
            state.exceeded_at = None;
        }
    }

    pub fn is_exceeded(&self) -> bool {
        self.lock().exceeded
    }

    /// When the current 429 window is expected to end.
    pub fn reset_at(&self) -> Option<UtcDateTime> {
        self.status().reset_at
    }

    /// True while a 429 is outstanding and its reset window has not passed.
    ///
    /// After the window the flag may still be set, but the next request is
    /// allowed through so its response can clear it.
    pub fn is_cooling_down(&self) -> bool {
        self.is_cooling_down_at(UtcDateTime::now())
    }

    pub fn is_cooling_down_at(&self, now: UtcDateTime) -> bool {
        self.reset_at().is_some_and(|reset_at| now < reset_at)
    }

    pub fn state(&self) -> RateLimitState {
        self.lock().clone()
    }

    pub fn status(&self) -> RateLimitStatus {
        let state = self.state();
        let percent_used = (state.total > 0).then(|| {
            let percent = f64::from(state.used) / f64::from(state.total) * 100.0;
            (percent * 10.0).round() / 10.0
        });
        let reset_at = state
            .exceeded
            .then_some(state.exceeded_at)
            .flatten()
            .map(|at| at + self.cooldown);

        RateLimitStatus {
            exceeded: state.exceeded,
            total: state.total,
            used: state.used,
            remaining: state.effective_remaining(),
            percent_used,
            last_updated: state.last_updated,
            reset_at,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_quota_headers(headers: &BTreeMap<String, String>) -> Result<Option<QuotaHeaders>, String> {
    let total = headers.get(HEADER_TOTAL);
    let used = headers.get(HEADER_USED);
    let remaining = headers.get(HEADER_REMAINING);

    if total.is_none() && used.is_none() && remaining.is_none() {
        return Ok(None);
    }

    let parse = |name: &str, value: Option<&String>| -> Result<u32, String> {
        let value = value.ok_or_else(|| format!("missing header {name}"))?;
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("header {name} is not a count: '{value}'"))
    };

    Ok(Some(QuotaHeaders {
        total: parse(HEADER_TOTAL, total)?,
        used: parse(HEADER_USED, used)?,
        remaining: parse(HEADER_REMAINING, remaining)?,
    }))
}
