//! Upstream response shapes, decoded once at the API boundary.
//!
//! Every field is optional: missing data becomes a safe default downstream
//! instead of failing the whole fetch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /oauth/identity`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityResponse {
    pub username: Option<String>,
}

/// `GET /users/{username}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileResponse {
    pub username: Option<String>,
    pub num_collection: Option<u64>,
    pub num_wantlist: Option<u64>,
    pub curr_abbr: Option<String>,
}

/// `GET /users/{username}/collection/value`
///
/// Amounts arrive as display strings such as `"$1,234.56"`; numbers are
/// tolerated too.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionValueResponse {
    pub minimum: Option<Value>,
    pub median: Option<Value>,
    pub maximum: Option<Value>,
}

/// `GET /users/{username}/collection/folders/0`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderResponse {
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub pages: Option<u32>,
    pub per_page: Option<u32>,
    pub items: Option<u64>,
}

/// One page of folder releases or wants. The item key differs per resource,
/// so both are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageResponse {
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub releases: Vec<PageItem>,
    #[serde(default)]
    pub wants: Vec<PageItem>,
}

impl PageResponse {
    pub fn into_items(self) -> Vec<PageItem> {
        if self.releases.is_empty() {
            self.wants
        } else {
            self.releases
        }
    }

    pub fn last_page(&self) -> u32 {
        self.pagination
            .as_ref()
            .and_then(|pagination| pagination.pages)
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageItem {
    pub basic_information: Option<BasicInformation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRef {
    pub name: Option<String>,
    pub catno: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRef {
    pub name: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Release summary shared by folder items and wants.
///
/// Fields not modelled here are kept in `extra` so exports stay lossless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInformation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<ArtistRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<FormatRef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_information_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "id": 7,
            "title": "Kind of Blue",
            "genres": ["Jazz"],
            "labels": [{"name": "Columbia", "catno": "CL 1355", "entity_type": "1"}]
        });

        let info: BasicInformation = serde_json::from_value(raw.clone()).expect("decodes");
        assert_eq!(info.title.as_deref(), Some("Kind of Blue"));
        assert_eq!(info.labels[0].catno.as_deref(), Some("CL 1355"));

        let back = serde_json::to_value(&info).expect("encodes");
        assert_eq!(back, raw);
    }

    #[test]
    fn page_response_accepts_either_item_key() {
        let wants: PageResponse = serde_json::from_str(
            r#"{"pagination": {"pages": 2}, "wants": [{"basic_information": {"id": 1}}]}"#,
        )
        .expect("decodes");
        assert_eq!(wants.last_page(), 2);
        assert_eq!(wants.into_items().len(), 1);

        let empty: PageResponse = serde_json::from_str("{}").expect("decodes");
        assert_eq!(empty.last_page(), 1);
        assert!(empty.into_items().is_empty());
    }
}
