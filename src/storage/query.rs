//! Rich-query model shared by the ledger store backends.
//!
//! Queries use the CouchDB selector shape, e.g.
//! `{"selector":{"orderId":{"$exists":true}},"sort":[{"createdAt":"desc"}]}`,
//! so the JSON form of a [`RichQuery`] is exactly what a document store expects.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Condition on a single top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldCondition {
    Exists {
        #[serde(rename = "$exists")]
        exists: bool,
    },
    Equals {
        #[serde(rename = "$eq")]
        value: Value,
    },
}

impl FieldCondition {
    fn matches(&self, field: Option<&Value>) -> bool {
        // A JSON null counts as absent, as in a document store.
        let present = field.filter(|v| !v.is_null());
        match self {
            FieldCondition::Exists { exists } => present.is_some() == *exists,
            FieldCondition::Equals { value } => present == Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RichQuery {
    pub selector: BTreeMap<String, FieldCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<BTreeMap<String, SortOrder>>,
}

impl RichQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_exists(mut self, field: impl Into<String>) -> Self {
        self.selector
            .insert(field.into(), FieldCondition::Exists { exists: true });
        self
    }

    pub fn field_equals(mut self, field: impl Into<String>, value: Value) -> Self {
        self.selector
            .insert(field.into(), FieldCondition::Equals { value });
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(BTreeMap::from([(field.into(), order)]));
        self
    }

    /// Flattened (field, order) pairs in sort priority.
    pub fn sort_keys(&self) -> Vec<(&str, SortOrder)> {
        self.sort
            .iter()
            .flat_map(|entry| entry.iter().map(|(field, order)| (field.as_str(), *order)))
            .collect()
    }

    /// Reject field names that cannot be addressed as top-level JSON members.
    pub fn validate(&self) -> Result<(), StoreError> {
        let fields = self
            .selector
            .keys()
            .map(String::as_str)
            .chain(self.sort_keys().into_iter().map(|(field, _)| field));

        for field in fields {
            if !is_valid_field_name(field) {
                return Err(StoreError::Query(format!(
                    "Invalid field name in query: '{}'",
                    field
                )));
            }
        }
        Ok(())
    }

    /// True if the document satisfies every selector condition.
    pub fn matches(&self, document: &Value) -> bool {
        self.selector
            .iter()
            .all(|(field, condition)| condition.matches(document.get(field)))
    }

    /// Compare two documents by the query's sort keys.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for (field, order) in self.sort_keys() {
            let ordering = compare_json(a.get(field), b.get(field));
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Text identifying the ordering of this query, bound into bookmarks.
    pub fn sort_signature(&self) -> String {
        self.sort_keys()
            .iter()
            .map(|(field, order)| format!("{}:{}", field, order))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn is_valid_field_name(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Rank of a JSON type in the sort order shared by every backend.
pub(crate) fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 4,
    }
}

/// Total order over optional JSON values: missing/null < bool < number < string < other.
/// Arrays and objects compare by their serialized text.
pub fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if type_rank(a) == 4 => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    }
}

/// Sort values and key of the last record a page returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// One value per sort key, `null` where the record lacks the field
    pub values: Vec<Value>,
    pub key: String,
}

impl Cursor {
    pub fn of(query: &RichQuery, document: &Value, key: &str) -> Self {
        let values = query
            .sort_keys()
            .into_iter()
            .map(|(field, _)| document.get(field).cloned().unwrap_or(Value::Null))
            .collect();
        Self {
            values,
            key: key.to_string(),
        }
    }
}

/// Continuation token handed out by paginated queries.
///
/// Callers treat it as opaque text. It holds the position of the last record returned
/// and the ordering it was issued for, so a bookmark cannot be replayed against another
/// sort. Resuming strictly after that position keeps pages disjoint even when records
/// are written between calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub sort: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Cursor>,
}

impl Bookmark {
    /// Bookmark for the first page of `query`.
    pub fn start(query: &RichQuery) -> Self {
        Self {
            sort: query.sort_signature(),
            after: None,
        }
    }

    /// Bookmark resuming after `cursor`.
    pub fn after(query: &RichQuery, cursor: Cursor) -> Self {
        Self {
            sort: query.sort_signature(),
            after: Some(cursor),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a bookmark for `query`. The empty string means "first page".
    pub fn decode(token: &str, query: &RichQuery) -> Result<Self, StoreError> {
        if token.is_empty() {
            return Ok(Self::start(query));
        }

        let bookmark: Bookmark = serde_json::from_str(token)
            .map_err(|_| StoreError::Query(format!("Invalid bookmark: '{}'", token)))?;

        if bookmark.sort != query.sort_signature() {
            return Err(StoreError::Query(format!(
                "Bookmark was issued for sort '{}' but query sorts by '{}'",
                bookmark.sort,
                query.sort_signature()
            )));
        }
        let sort_len = query.sort_keys().len();
        if bookmark
            .after
            .as_ref()
            .is_some_and(|cursor| cursor.values.len() != sort_len)
        {
            return Err(StoreError::Query(format!("Invalid bookmark: '{}'", token)));
        }

        Ok(bookmark)
    }

    /// Where a record falls relative to the bookmark: `Greater` means it belongs to a
    /// later page. Ties on every sort value break on the key, ascending.
    pub fn position(&self, query: &RichQuery, document: &Value, key: &str) -> Ordering {
        let Some(cursor) = &self.after else {
            return Ordering::Greater;
        };

        for ((field, order), bound) in query.sort_keys().into_iter().zip(&cursor.values) {
            let ordering = compare_json(document.get(field), Some(bound));
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        key.cmp(cursor.key.as_str())
    }
}
