use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{EndpointId, UtcDateTime};

/// Placeholder username until the first successful identity fetch.
pub const UNKNOWN_USER: &str = "Unknown";

/// Currency assumed until the user profile reports one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Collection valuation as reported by the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionValue {
    pub min: f64,
    pub median: f64,
    pub max: f64,
    pub currency: String,
}

impl Default for CollectionValue {
    fn default() -> Self {
        Self {
            min: 0.0,
            median: 0.0,
            max: 0.0,
            currency: String::from(DEFAULT_CURRENCY),
        }
    }
}

/// Display metadata for a sampled record. Every field is optional upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub cat_no: Option<String>,
    pub cover_image: Option<String>,
    pub format: Option<String>,
    pub label: Option<String>,
    pub released: Option<i32>,
}

/// One record sampled uniformly from the user's collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomRecord {
    /// `"Artist - Title"`; `None` until the first successful sample.
    pub title: Option<String>,
    pub metadata: Option<RecordMetadata>,
}

/// Last-known-good values for every endpoint.
///
/// Each field is owned by exactly one endpoint and only changes after a
/// successful fetch of that endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub user: String,
    pub currency: String,
    pub collection_count: u64,
    pub wantlist_count: u64,
    pub collection_value: CollectionValue,
    pub random_record: RandomRecord,
    pub last_success: BTreeMap<EndpointId, Option<UtcDateTime>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            user: String::from(UNKNOWN_USER),
            currency: String::from(DEFAULT_CURRENCY),
            collection_count: 0,
            wantlist_count: 0,
            collection_value: CollectionValue::default(),
            random_record: RandomRecord::default(),
            last_success: EndpointId::ALL
                .into_iter()
                .map(|endpoint| (endpoint, None))
                .collect(),
        }
    }
}

impl Snapshot {
    pub fn has_user(&self) -> bool {
        !self.user.is_empty() && self.user != UNKNOWN_USER
    }

    pub fn username(&self) -> Option<&str> {
        self.has_user().then_some(self.user.as_str())
    }

    pub fn last_success(&self, endpoint: EndpointId) -> Option<UtcDateTime> {
        self.last_success.get(&endpoint).copied().flatten()
    }

    pub fn mark_success(&mut self, endpoint: EndpointId, at: UtcDateTime) {
        self.last_success.insert(endpoint, Some(at));
    }

    /// Fills in endpoint keys missing from an older persisted snapshot.
    pub fn normalize(mut self) -> Self {
        for endpoint in EndpointId::ALL {
            self.last_success.entry(endpoint).or_insert(None);
        }
        if self.user.is_empty() {
            self.user = String::from(UNKNOWN_USER);
        }
        self
    }
}
