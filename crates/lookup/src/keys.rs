//! Collecting the distinct content keys to look up.

use crate::models::DependencyProps;
use std::collections::HashMap;

/// Lookup results, one entry per content key.
pub type ResultMap = HashMap<String, DependencyProps>;

/// Something that may be identified by the hash of its content.
pub trait ContentKeyed {
    /// The content key, if known. An empty key counts as unknown.
    fn content_key(&self) -> Option<&str>;
}
impl ContentKeyed for str {
    fn content_key(&self) -> Option<&str> {
        Some(self)
    }
}
impl ContentKeyed for String {
    fn content_key(&self) -> Option<&str> {
        Some(self)
    }
}
impl<T: ContentKeyed + ?Sized> ContentKeyed for &T {
    fn content_key(&self) -> Option<&str> {
        (**self).content_key()
    }
}

/// Distinct, non-empty content keys in a stable (sorted) order.
///
/// ```
/// use depinfo_lookup::KeySet;
///
/// let keys: KeySet = ["b", "a", "", "b"].into_iter().collect();
/// assert_eq!(keys.as_slice(), ["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet(Vec<String>);
impl KeySet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.binary_search_by(|k| k.as_str().cmp(key)).is_ok()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}
impl<S: Into<String>> FromIterator<S> for KeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut keys: Vec<String> = iter.into_iter().map(Into::into).filter(|k| !k.is_empty()).collect();
        keys.sort_unstable();
        keys.dedup();
        Self(keys)
    }
}
impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Collect the key set of `records`, and a result map holding an empty entry
/// for every key in it. Records without a key are skipped.
pub fn collect<I>(records: I) -> (KeySet, ResultMap)
where
    I: IntoIterator,
    I::Item: ContentKeyed,
{
    let keys: KeySet = records
        .into_iter()
        .filter_map(|record| record.content_key().map(str::to_string))
        .collect();
    let results = keys.iter().map(|k| (k.clone(), DependencyProps::default())).collect();
    (keys, results)
}
