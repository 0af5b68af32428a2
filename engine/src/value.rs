//! Dynamic host values and the generic base codec.
//!
//! Fields declared without a specific codec hold a [`Value`], and the
//! adapter's global custom serializer receives one. [`base_serialize`] turns
//! a `Value` into its query representation; values that have no meaningful
//! representation serialize to `None` and the key is left out of the query.

use crate::QueryValue;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// A dynamically typed value as it exists on the host side.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    /// Plain object, insertion ordered
    Object(IndexMap<String, Value>),
    /// Host value without a query representation (function, symbol, map, ...)
    Opaque(&'static str),
}

impl Value {
    /// Values the base codec refuses to serialize.
    pub fn is_invalid(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Opaque(_) => true,
            Value::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Encode as JSON, or `None` when nothing remains to encode.
    ///
    /// Non-finite numbers become the strings `"NaN"`, `"Infinity"` and
    /// `"-Infinity"`. Object members that are undefined or opaque are
    /// dropped. So is any non-empty object, this one included, whose members
    /// are all undefined or opaque. `null` members and `{}` are kept.
    pub fn to_json_string(&self) -> Option<String> {
        to_json(self, true).and_then(|json| serde_json::to_string(&json).ok())
    }

    /// Encode as plain JSON, the way array elements are written.
    fn to_plain_json_string(&self) -> Option<String> {
        to_json(self, false).and_then(|json| serde_json::to_string(&json).ok())
    }

    /// Text form of a primitive, or `None` for composite and invalid values.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) if !n.is_nan() => Some(format_number(*n)),
            Value::String(s) => Some(s.clone()),
            Value::Date(d) => Some(format_iso(d)),
            _ => None,
        }
    }
}

/// The generic base codec.
pub fn base_serialize(value: &Value) -> Option<QueryValue> {
    if value.is_invalid() {
        return None;
    }
    match value {
        Value::Array(items) => Some(QueryValue::Multi(
            items
                .iter()
                .filter(|item| !item.is_invalid())
                .filter_map(|item| match item {
                    Value::Array(_) | Value::Object(_) => item.to_plain_json_string(),
                    other => other.to_text(),
                })
                .collect(),
        )),
        Value::Object(_) => value.to_json_string().map(QueryValue::Single),
        other => other.to_text().map(QueryValue::Single),
    }
}

/// Number to text the way the host prints numbers: integral values have no
/// fraction, `-0` prints as `0`, very large and very small magnitudes use
/// exponent notation.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

pub(crate) fn format_iso(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Whether the host's JSON encoder omits `value` as an object member.
fn is_omitted(value: &Value) -> bool {
    matches!(value, Value::Undefined | Value::Opaque(_))
}

fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// JSON tree for `value`, `None` where the encoder leaves the value out.
///
/// With `prune` set, non-finite numbers are spelled out as strings and a
/// non-empty object whose members would all be omitted is itself omitted.
/// Without it, the encoding is the host's plain one: non-finite numbers
/// become `null`.
fn to_json(value: &Value, prune: bool) -> Option<serde_json::Value> {
    use serde_json::Value as Json;

    Some(match value {
        Value::Undefined | Value::Opaque(_) => return None,
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) if n.is_finite() => json_number(*n),
        Value::Number(n) if prune => Json::String(format_number(*n)),
        Value::Number(_) => Json::Null,
        Value::String(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(format_iso(d)),
        Value::Array(items) => Json::Array(
            items
                .iter()
                .map(|item| to_json(item, prune).unwrap_or(Json::Null))
                .collect(),
        ),
        Value::Object(members) => {
            if prune && !members.is_empty() && members.values().all(is_omitted) {
                return None;
            }
            Json::Object(
                members
                    .iter()
                    .filter_map(|(key, member)| to_json(member, prune).map(|v| (key.clone(), v)))
                    .collect(),
            )
        }
    })
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(members) => Value::Object(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
