use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Logical upstream data source with its own polling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointId {
    Collection,
    Wantlist,
    CollectionValue,
    RandomRecord,
}

impl EndpointId {
    /// Tick order: cheap, likely-to-succeed calls first.
    pub const ALL: [Self; 4] = [
        Self::Collection,
        Self::Wantlist,
        Self::CollectionValue,
        Self::RandomRecord,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Wantlist => "wantlist",
            Self::CollectionValue => "collection_value",
            Self::RandomRecord => "random_record",
        }
    }

    /// Endpoints that still run while the upstream quota is exhausted.
    ///
    /// The identity call is the only one every other endpoint depends on, and a
    /// successful non-429 response is what clears the exceeded flag.
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Collection)
    }
}

impl Display for EndpointId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "collection" => Ok(Self::Collection),
            "wantlist" => Ok(Self::Wantlist),
            "collection_value" | "value" => Ok(Self::CollectionValue),
            "random_record" | "random" => Ok(Self::RandomRecord),
            other => Err(ValidationError::InvalidEndpoint {
                value: other.to_owned(),
            }),
        }
    }
}

/// Paginated resource that can be bulk exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Collection,
    Wantlist,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Wantlist => "wantlist",
        }
    }

    /// JSON key holding the item array in a page response.
    pub const fn page_key(self) -> &'static str {
        match self {
            Self::Collection => "releases",
            Self::Wantlist => "wants",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "collection" => Ok(Self::Collection),
            "wantlist" | "wants" => Ok(Self::Wantlist),
            other => Err(ValidationError::InvalidResource {
                value: other.to_owned(),
            }),
        }
    }
}
