use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Raw query-string parameters of a list request.
///
/// Values are kept as untyped strings; every field the list pipeline reads is
/// parsed with a total function, so nothing here can fail to deserialize.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ListQuery(HashMap<String, String>);

impl ListQuery {
    /// Returns the value for `key`, treating an empty string as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for ListQuery
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

// Page-size bounds applied at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

pub fn default_limit() -> u64 {
    20
}

pub fn default_max_limit() -> u64 {
    100
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Ordering directive value: `1` ascending, `-1` descending.
    pub fn direction(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Single-key ordering directive handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: i32,
}

impl SortSpec {
    pub fn is_ascending(&self) -> bool {
        self.direction > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Fields(Vec<String>),
}

/// Normalized pagination, sort and selection settings of one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationRequest {
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub fields: Option<String>,
}

impl PaginationRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            skip: page.saturating_sub(1).saturating_mul(limit),
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_order: SortOrder::Desc,
            fields: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSelection {
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub fields: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<u64>,
    pub prev_page: Option<u64>,
}

// Envelope returned by every generic list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Deserializes a string with surrounding whitespace removed, so length checks see the stored text.
pub fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|value| value.trim().to_string())
}

pub fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
        .map(|value| value.map(|value| value.trim().to_string()))
}

/// Serializes a model into a top-level JSON object for the document store.
pub fn to_document<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
