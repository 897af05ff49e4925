//! Search criteria for one batch of keys.

use crate::models::MetadataRecord;
use serde_json::{Map, Value, json};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Field of the store's items that holds the content hash.
const KEY_FIELD: &str = "actual_sha1";
const SCOPE_FIELD: &str = "repo";

/// Find the items whose content hash is any of `keys`, optionally only
/// within one repository.
///
/// It renders to the store's `items.find` criteria:
///
/// ```
/// use depinfo_lookup::KeyQuery;
/// use serde_json::json;
///
/// let query = KeyQuery::new(["a1", "b2"]).with_scope(Some("libs-release"));
/// assert_eq!(
///     query.criteria(),
///     json!({"repo": "libs-release", "$or": [{"actual_sha1": "a1"}, {"actual_sha1": "b2"}]}),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyQuery {
    keys: Vec<String>,
    scope: Option<String>,
}
impl KeyQuery {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            scope: None,
        }
    }

    /// Restrict the query to one repository; an empty name is no restriction.
    pub fn with_scope<S: Into<String>>(mut self, scope: Option<S>) -> Self {
        self.scope = scope.map(Into::into).filter(|s| !s.is_empty());
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn criteria(&self) -> Value {
        let mut criteria = Map::new();
        if let Some(scope) = &self.scope {
            criteria.insert(SCOPE_FIELD.to_string(), json!(scope));
        }
        match self.keys.as_slice() {
            [key] => {
                criteria.insert(KEY_FIELD.to_string(), json!(key));
            },
            keys => {
                let any: Vec<Value> = keys.iter().map(|k| json!({ KEY_FIELD: k })).collect();
                criteria.insert("$or".to_string(), Value::Array(any));
            },
        }
        Value::Object(criteria)
    }

    /// Whether the store should return `record` for this query.
    pub fn matches(&self, record: &MetadataRecord) -> bool {
        let in_scope = match &self.scope {
            Some(scope) => record.repo.as_deref() == Some(scope.as_str()),
            None => true,
        };
        in_scope && self.keys.contains(&record.key)
    }
}
impl Display for KeyQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "items.find({})", self.criteria())
    }
}
