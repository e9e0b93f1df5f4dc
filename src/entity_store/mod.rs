/// Entry metadata storage
///
/// A generic keyed store for `BlobStorageEntry` records with conjunctive
/// conditions, sorting and cursor pagination. Records are keyed by
/// `(id, userIdentity, nodeIdentity)` so one blob can carry an entry per tenant.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryEntityStorage;
pub use sqlite::SqliteEntityStorage;

use crate::{
    blob_store::BlobStorageEntry,
    error::{BlobError, BlobResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Page size used when the caller doesn't ask for one
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound on a single page
pub const MAX_PAGE_SIZE: usize = 100;

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    /// Substring for strings, membership for arrays
    Includes,
}

/// A single property constraint, evaluated against the camelCase JSON form of an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Property name, dotted for nested metadata (e.g. `metadata.title`)
    pub property: String,
    #[serde(default)]
    pub comparison: Comparison,
    pub value: Value,
}

impl Condition {
    pub fn equals(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            comparison: Comparison::Equals,
            value: value.into(),
        }
    }

    pub fn new(
        property: impl Into<String>,
        comparison: Comparison,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            property: property.into(),
            comparison,
            value: value.into(),
        }
    }

    /// Evaluate against a JSON document
    pub fn matches(&self, document: &Value) -> bool {
        let field = lookup(document, &self.property).unwrap_or(&Value::Null);

        match self.comparison {
            Comparison::Equals => field == &self.value,
            Comparison::NotEquals => field != &self.value,
            Comparison::GreaterThan => {
                !field.is_null() && compare_values(field, &self.value) == Ordering::Greater
            }
            Comparison::LessThan => {
                !field.is_null() && compare_values(field, &self.value) == Ordering::Less
            }
            Comparison::Includes => match (field, &self.value) {
                (Value::String(haystack), Value::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                (Value::Array(items), needle) => items.contains(needle),
                _ => false,
            },
        }
    }
}

/// Sort direction for queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc", alias = "ascending")]
    Ascending,
    #[default]
    #[serde(rename = "desc", alias = "descending")]
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Sort order for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub property: String,
    pub direction: SortDirection,
}

/// One page of entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPage {
    pub entries: Vec<BlobStorageEntry>,
    /// Opaque cursor for the next page, `None` when exhausted
    pub cursor: Option<String>,
}

/// Entity storage connector trait
#[async_trait]
pub trait EntityStorageConnector: Send + Sync {
    /// First entry with this id that satisfies every condition
    async fn get(&self, id: &str, conditions: &[Condition]) -> BlobResult<Option<BlobStorageEntry>>;

    /// Insert or replace by `(id, userIdentity, nodeIdentity)`
    async fn set(&self, entry: BlobStorageEntry) -> BlobResult<()>;

    /// Remove the first entry with this id that satisfies every condition
    async fn remove(&self, id: &str, conditions: &[Condition]) -> BlobResult<bool>;

    /// Filtered, sorted, paginated listing
    async fn query(
        &self,
        conditions: &[Condition],
        sort: Option<SortBy>,
        cursor: Option<String>,
        page_size: Option<usize>,
    ) -> BlobResult<EntityPage>;

    /// Number of entries (any tenant) that share this id
    async fn count(&self, id: &str) -> BlobResult<usize>;
}

/// Resolve a dotted property path
pub(crate) fn lookup<'a>(document: &'a Value, property: &str) -> Option<&'a Value> {
    property
        .split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

/// Property names end up in JSON paths, keep them to plain identifiers
pub(crate) fn validate_property(property: &str) -> BlobResult<()> {
    let valid = !property.is_empty()
        && property
            .split('.')
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));

    if !valid {
        return Err(BlobError::Validation(format!(
            "Invalid property name: \"{}\"",
            property
        )));
    }
    Ok(())
}

pub(crate) fn validate_conditions(conditions: &[Condition]) -> BlobResult<()> {
    conditions
        .iter()
        .try_for_each(|c| validate_property(&c.property))
}

/// Cursor is the offset of the next page, bounded by what SQLite can bind
pub(crate) fn parse_cursor(cursor: Option<&str>) -> BlobResult<usize> {
    let Some(c) = cursor.filter(|c| !c.is_empty()) else {
        return Ok(0);
    };
    c.parse::<usize>()
        .ok()
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| BlobError::Validation(format!("Invalid cursor: \"{}\"", c)))
}

pub(crate) fn clamp_page_size(page_size: Option<usize>) -> usize {
    page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}

/// Total order over JSON values used for sorting
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_matching() {
        let doc = json!({
            "id": "blob:memory:abc",
            "blobSize": 10,
            "encodingFormat": "text/plain",
            "metadata": {"title": "Quarterly report", "tags": ["finance", "q3"]}
        });

        assert!(Condition::equals("blobSize", 10).matches(&doc));
        assert!(Condition::equals("userIdentity", Value::Null).matches(&doc));
        assert!(Condition::new("encodingFormat", Comparison::NotEquals, "image/png").matches(&doc));
        assert!(Condition::new("blobSize", Comparison::GreaterThan, 5).matches(&doc));
        assert!(!Condition::new("blobSize", Comparison::LessThan, 5).matches(&doc));
        assert!(Condition::new("metadata.title", Comparison::Includes, "report").matches(&doc));
        assert!(Condition::new("metadata.tags", Comparison::Includes, "q3").matches(&doc));
        assert!(!Condition::new("missing", Comparison::GreaterThan, 0).matches(&doc));
    }

    #[test]
    fn test_condition_deserializes_with_default_comparison() {
        let condition: Condition =
            serde_json::from_value(json!({"property": "fileExtension", "value": "txt"})).unwrap();
        assert_eq!(condition.comparison, Comparison::Equals);

        let condition: Condition = serde_json::from_value(
            json!({"property": "blobSize", "comparison": "greaterThan", "value": 3}),
        )
        .unwrap();
        assert_eq!(condition.comparison, Comparison::GreaterThan);
    }

    #[test]
    fn test_sort_direction_aliases() {
        let asc: SortDirection = serde_json::from_value(json!("ascending")).unwrap();
        let desc: SortDirection = serde_json::from_value(json!("desc")).unwrap();
        assert_eq!(asc, SortDirection::Ascending);
        assert_eq!(desc, SortDirection::Descending);
    }

    #[test]
    fn test_property_validation() {
        assert!(validate_property("metadata.title").is_ok());
        assert!(validate_property("date_created").is_ok());
        assert!(validate_property("").is_err());
        assert!(validate_property("a..b").is_err());
        assert!(validate_property("x'); DROP TABLE").is_err());
    }

    #[test]
    fn test_cursor_and_page_size() {
        assert_eq!(parse_cursor(None).unwrap(), 0);
        assert_eq!(parse_cursor(Some("40")).unwrap(), 40);
        assert!(parse_cursor(Some("abc")).is_err());
        assert!(parse_cursor(Some(&usize::MAX.to_string())).is_err());
        assert!(parse_cursor(Some("-1")).is_err());
        assert_eq!(
            parse_cursor(Some(&i64::MAX.to_string())).unwrap(),
            i64::MAX as usize
        );
        assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), 1);
        assert_eq!(clamp_page_size(Some(5000)), MAX_PAGE_SIZE);
    }
}
