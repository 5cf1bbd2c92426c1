//! # Domain Models
//!
//! Values the coordinator keeps for display consumers.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Snapshot`] | Last-known-good values for every endpoint |
//! | [`CollectionValue`] | Min/median/max collection valuation |
//! | [`RandomRecord`] | Sampled record title and metadata |
//! | [`RecordMetadata`] | Catalog number, cover, format, label, year |
//! | [`UtcDateTime`] | UTC timestamp |

mod snapshot;
mod timestamp;

pub use snapshot::{
    CollectionValue, RandomRecord, RecordMetadata, Snapshot, DEFAULT_CURRENCY, UNKNOWN_USER,
};
pub use timestamp::UtcDateTime;
