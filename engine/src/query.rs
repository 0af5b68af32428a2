//! Query snapshots: the wire-side view of URL query parameters.
//!
//! A [`Query`] is what the router currently has in the address bar, or what
//! the engine derives from the declared fields. Values are either a single
//! string or a list of strings, the latter being how a repeated key
//! (`?a=1&a=2`) is represented.
//!
//! Snapshots keep insertion order so that a pushed URL lists keys in the order
//! they were declared. Equality ignores order; see [`crate::diff`].

use crate::{diff, error::Result, Error, QueryKey};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized value of one query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Key appears once: `?a=1`
    Single(String),
    /// Key repeats: `?a=1&a=2`
    Multi(Vec<String>),
}

impl QueryValue {
    /// The value a scalar field reads: the string itself, or the first
    /// element of a repeated key.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(s) => Some(s),
            QueryValue::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// The values an array field reads; a single string becomes one element.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            QueryValue::Single(s) => vec![s.clone()],
            QueryValue::Multi(values) => values.clone(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = QueryValue::Multi(vec![first, value]);
            }
            QueryValue::Multi(values) => values.push(value),
        }
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multi(values)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        QueryValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// A snapshot of query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    params: IndexMap<QueryKey, QueryValue>,
}

impl Query {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self {
            params: IndexMap::new(),
        }
    }

    /// Parse a URL query string (with or without the leading `?`).
    ///
    /// `+` decodes to a space, pairs without `=` get an empty value and a
    /// repeated key collects into [`QueryValue::Multi`].
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.strip_prefix('?').unwrap_or(input);
        let mut query = Query::new();

        for pair in input.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key)?;
            let value = decode_component(raw_value)?;

            match query.params.get_mut(&key) {
                Some(existing) => existing.push(value),
                None => {
                    query.params.insert(key, QueryValue::Single(value));
                }
            }
        }

        Ok(query)
    }

    /// Encode as a query string without the leading `?`.
    ///
    /// A [`QueryValue::Multi`] repeats its key once per element; an empty
    /// list contributes nothing.
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::with_capacity(self.params.len());
        for (key, value) in &self.params {
            let key = urlencoding::encode(key);
            match value {
                QueryValue::Single(v) => pairs.push(format!("{}={}", key, urlencoding::encode(v))),
                QueryValue::Multi(values) => {
                    for v in values {
                        pairs.push(format!("{}={}", key, urlencoding::encode(v)));
                    }
                }
            }
        }
        pairs.join("&")
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Insert a value. An existing key keeps its position.
    pub fn insert(
        &mut self,
        key: impl Into<QueryKey>,
        value: impl Into<QueryValue>,
    ) -> Option<QueryValue> {
        self.params.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<QueryKey>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove a key, preserving the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<QueryValue> {
        self.params.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.params.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QueryKey, &QueryValue)> {
        self.params.iter()
    }

    /// Copy of this snapshot keeping only the keys that match `keep`.
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> Query {
        self.params
            .iter()
            .filter(|(key, _)| keep(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Copy of this snapshot without the given keys.
    pub fn without_keys<S: AsRef<str>>(&self, keys: &[S]) -> Query {
        self.filtered(|key| !keys.iter().any(|k| k.as_ref() == key))
    }

    /// Overlay another snapshot: keys from `other` win, existing keys keep
    /// their position.
    pub fn merge(&mut self, other: Query) {
        self.params.extend(other.params);
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        diff::snapshots_equal(self, other)
    }
}

impl Eq for Query {}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<QueryKey>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = (&'a QueryKey, &'a QueryValue);
    type IntoIter = indexmap::map::Iter<'a, QueryKey, QueryValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

fn decode_component(raw: &str) -> Result<String> {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::InvalidQueryString(format!("{}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_and_repeated_keys() {
        let query = Query::parse("?a=1&b=x&a=2&a=3").unwrap();

        assert_eq!(query.get("a"), Some(&QueryValue::from(vec!["1", "2", "3"])));
        assert_eq!(query.get("b"), Some(&QueryValue::from("x")));
        assert_eq!(query.len(), 2);
    }

    #[test]
    fn parse_decodes_components() {
        let query = Query::parse("obj=%7B%22a%22%3A1%7D&name=hello+world&empty=&flag").unwrap();

        assert_eq!(query.get("obj"), Some(&QueryValue::from(r#"{"a":1}"#)));
        assert_eq!(query.get("name"), Some(&QueryValue::from("hello world")));
        assert_eq!(query.get("empty"), Some(&QueryValue::from("")));
        assert_eq!(query.get("flag"), Some(&QueryValue::from("")));
    }

    #[test]
    fn parse_empty_input() {
        assert!(Query::parse("").unwrap().is_empty());
        assert!(Query::parse("?").unwrap().is_empty());
        assert!(Query::parse("&&").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_invalid_utf8_escape() {
        let result = Query::parse("a=%FF");
        assert!(matches!(result, Err(Error::InvalidQueryString(_))));
    }

    #[test]
    fn encode_keeps_insertion_order_and_repeats_keys() {
        let query = Query::new()
            .with("str", "test")
            .with("obj", r#"{"a":1,"b":2}"#)
            .with("arr", vec!["a", "b"]);

        assert_eq!(
            query.to_query_string(),
            "str=test&obj=%7B%22a%22%3A1%2C%22b%22%3A2%7D&arr=a&arr=b"
        );
    }

    #[test]
    fn encode_omits_empty_multi() {
        let query = Query::new()
            .with("a", Vec::<String>::new())
            .with("b", "1");
        assert_eq!(query.to_string(), "b=1");
    }

    #[test]
    fn insert_existing_key_keeps_position() {
        let mut query = Query::new().with("a", "1").with("b", "2");
        query.insert("a", "3");

        let keys: Vec<_> = query.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(query.get("a"), Some(&QueryValue::from("3")));
    }

    #[test]
    fn merge_overrides_and_appends() {
        let mut base = Query::new().with("keep", "1").with("shared", "old");
        base.merge(Query::new().with("shared", "new").with("added", "2"));

        assert_eq!(base.to_query_string(), "keep=1&shared=new&added=2");
    }

    #[test]
    fn without_keys_and_remove() {
        let mut query = Query::new().with("a", "1").with("b", "2").with("c", "3");
        assert_eq!(query.without_keys(&["a", "c"]), Query::new().with("b", "2"));

        query.remove("b");
        assert_eq!(query.to_query_string(), "a=1&c=3");
    }

    #[test]
    fn equality_ignores_order() {
        let a = Query::new().with("a", "1").with("b", "2");
        let b = Query::new().with("b", "2").with("a", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn query_value_normalisation() {
        let single = QueryValue::from("x");
        let multi = QueryValue::from(vec!["y", "z"]);
        let empty = QueryValue::Multi(Vec::new());

        assert_eq!(single.first(), Some("x"));
        assert_eq!(multi.first(), Some("y"));
        assert_eq!(empty.first(), None);
        assert_eq!(single.to_vec(), vec!["x".to_string()]);
        assert_eq!(multi.to_vec(), vec!["y".to_string(), "z".to_string()]);
    }

    #[test]
    fn json_shape() {
        let query = Query::new().with("a", "1").with("b", vec!["x", "y"]);
        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(json, r#"{"a":"1","b":["x","y"]}"#);

        let parsed: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, query);
    }
}
