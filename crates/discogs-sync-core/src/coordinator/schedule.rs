use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{EndpointId, UtcDateTime};

pub const DEFAULT_GLOBAL_MINUTES: i64 = 10;
pub const DEFAULT_COLLECTION_VALUE_MINUTES: i64 = 30;
pub const DEFAULT_RANDOM_RECORD_MINUTES: i64 = 240;

/// Shortest timer period the run loop will use.
pub const MIN_TICK_PERIOD: Duration = Duration::from_secs(60);
/// Timer period when every endpoint is disabled.
pub const IDLE_TICK_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Per-endpoint polling intervals in minutes. Zero or negative disables an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSchedule {
    pub global_minutes: i64,
    pub overrides: BTreeMap<EndpointId, i64>,
}

impl Default for EndpointSchedule {
    fn default() -> Self {
        Self {
            global_minutes: DEFAULT_GLOBAL_MINUTES,
            overrides: BTreeMap::from([
                (EndpointId::CollectionValue, DEFAULT_COLLECTION_VALUE_MINUTES),
                (EndpointId::RandomRecord, DEFAULT_RANDOM_RECORD_MINUTES),
            ]),
        }
    }
}

/// Atomic change to an [`EndpointSchedule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalUpdate {
    pub global_minutes: Option<i64>,
    pub set: BTreeMap<EndpointId, i64>,
    /// Overrides to drop; those endpoints fall back to the global default.
    pub clear: Vec<EndpointId>,
}

impl IntervalUpdate {
    pub fn global(minutes: i64) -> Self {
        Self {
            global_minutes: Some(minutes),
            ..Self::default()
        }
    }

    pub fn set(mut self, endpoint: EndpointId, minutes: i64) -> Self {
        self.set.insert(endpoint, minutes);
        self
    }

    pub fn clear(mut self, endpoint: EndpointId) -> Self {
        self.clear.push(endpoint);
        self
    }
}

impl EndpointSchedule {
    /// Every endpoint on the same interval, no overrides.
    pub fn uniform(minutes: i64) -> Self {
        Self {
            global_minutes: minutes,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, endpoint: EndpointId, minutes: i64) -> Self {
        self.overrides.insert(endpoint, minutes);
        self
    }

    pub fn minutes(&self, endpoint: EndpointId) -> i64 {
        self.overrides
            .get(&endpoint)
            .copied()
            .unwrap_or(self.global_minutes)
    }

    /// `None` when the endpoint never auto-updates.
    pub fn interval(&self, endpoint: EndpointId) -> Option<Duration> {
        let minutes = self.minutes(endpoint);
        (minutes > 0).then(|| Duration::from_secs(minutes.unsigned_abs().saturating_mul(60)))
    }

    /// Due when enabled and never fetched, or when a full interval has passed.
    pub fn is_due(
        &self,
        endpoint: EndpointId,
        last_success: Option<UtcDateTime>,
        now: UtcDateTime,
    ) -> bool {
        let Some(interval) = self.interval(endpoint) else {
            return false;
        };
        match last_success {
            None => true,
            Some(at) => now.saturating_elapsed_since(at) >= interval,
        }
    }

    pub fn shortest_enabled(&self) -> Option<Duration> {
        EndpointId::ALL
            .into_iter()
            .filter_map(|endpoint| self.interval(endpoint))
            .min()
    }

    pub fn tick_period(&self) -> Duration {
        self.shortest_enabled()
            .map_or(IDLE_TICK_PERIOD, |shortest| shortest.max(MIN_TICK_PERIOD))
    }

    /// Interval in minutes for every endpoint after fallback.
    pub fn effective(&self) -> BTreeMap<EndpointId, i64> {
        EndpointId::ALL
            .into_iter()
            .map(|endpoint| (endpoint, self.minutes(endpoint)))
            .collect()
    }

    pub fn apply(&mut self, update: &IntervalUpdate) {
        if let Some(global) = update.global_minutes {
            self.global_minutes = global;
        }
        for endpoint in &update.clear {
            self.overrides.remove(endpoint);
        }
        for (endpoint, minutes) in &update.set {
            self.overrides.insert(*endpoint, *minutes);
        }
    }
}
