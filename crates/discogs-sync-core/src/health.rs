use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Default number of consecutive auth failures before the token is reported as rejected.
pub const DEFAULT_AUTH_FAILURE_THRESHOLD: u32 = 3;

/// Whether the configured token is still accepted upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Healthy,
    /// Auth failures seen, threshold not reached yet.
    Failing,
    /// Threshold reached; the token most likely needs replacing.
    Rejected,
}

/// Read model for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHealth {
    pub state: CredentialState,
    pub consecutive_auth_failures: u32,
    pub threshold: u32,
}

#[derive(Debug, Default)]
struct HealthInner {
    consecutive_auth_failures: u32,
}

/// Thread-safe consecutive auth failure counter.
///
/// Non-auth failures leave the count alone; any success resets it.
#[derive(Debug)]
pub struct CredentialMonitor {
    threshold: u32,
    inner: Mutex<HealthInner>,
}

impl Default for CredentialMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_FAILURE_THRESHOLD)
    }
}

impl CredentialMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            inner: Mutex::new(HealthInner::default()),
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_auth_failures = 0;
    }

    /// Returns `true` exactly once: on the failure that reaches the threshold.
    pub fn record_auth_failure(&self) -> bool {
        let mut inner = self.lock();
        inner.consecutive_auth_failures = inner.consecutive_auth_failures.saturating_add(1);
        inner.consecutive_auth_failures == self.threshold
    }

    pub fn state(&self) -> CredentialState {
        self.health().state
    }

    pub fn health(&self) -> CredentialHealth {
        let failures = self.lock().consecutive_auth_failures;
        let state = if failures == 0 {
            CredentialState::Healthy
        } else if failures < self.threshold {
            CredentialState::Failing
        } else {
            CredentialState::Rejected
        };

        CredentialHealth {
            state,
            consecutive_auth_failures: failures,
            threshold: self.threshold,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
