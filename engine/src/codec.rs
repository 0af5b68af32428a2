//! Value codecs: how a field's typed value maps to and from the query.
//!
//! Each codec is a pure pair of functions for one value type plus the type's
//! canonical empty value, which is what a field resets to when the caller
//! gave no default and the field is neither nullable nor optional.
//!
//! Scalar codecs read the first element when a key is repeated in the URL.
//! Array codecs wrap a lone string into a one-element list.
//!
//! The [`Codec`] trait is open: implement it to make any type a field type.

use crate::{
    error::Result,
    value::{base_serialize, format_number},
    Error, QueryValue, Value,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialize/deserialize policy for one value type.
pub trait Codec {
    type Value: Clone;

    /// Convert to the query representation. `None` leaves the key out.
    fn serialize(&self, value: &Self::Value) -> Option<QueryValue>;

    /// Parse a raw query value. Failure leaves the field untouched.
    fn deserialize(&self, raw: &QueryValue) -> Result<Self::Value>;

    /// Canonical empty value of the type.
    fn empty(&self) -> Self::Value;

    /// Dynamic view of the value for the adapter's global custom serializer.
    ///
    /// Codecs with a fixed wire format of their own (dates, JSON records)
    /// return `None` and are never handed to the global serializer.
    fn to_dynamic(&self, _value: &Self::Value) -> Option<Value> {
        None
    }
}

/// In-memory value of a field, distinguishing `null` from "not set".
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    Present(T),
    Null,
    Undefined,
}

impl<T> FieldValue<T> {
    pub fn as_present(&self) -> Option<&T> {
        match self {
            FieldValue::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            FieldValue::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, FieldValue::Present(_))
    }
}

impl<T> From<T> for FieldValue<T> {
    fn from(value: T) -> Self {
        FieldValue::Present(value)
    }
}

/// Which "empty" states a field admits besides its type's own empty value.
///
/// When a field is declared both nullable and optional, nullable wins: the
/// reset value is `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Nullability {
    #[default]
    Required,
    Nullable,
    Optional,
}

/// Value a field resets to: explicit default, else `null` if nullable, else
/// undefined if optional, else the codec's empty value.
pub fn resolve_default<C: Codec>(
    codec: &C,
    explicit: Option<&FieldValue<C::Value>>,
    nullability: Nullability,
) -> FieldValue<C::Value> {
    if let Some(value) = explicit {
        return value.clone();
    }
    match nullability {
        Nullability::Nullable => FieldValue::Null,
        Nullability::Optional => FieldValue::Undefined,
        Nullability::Required => FieldValue::Present(codec.empty()),
    }
}

fn first(raw: &QueryValue) -> Result<&str> {
    raw.first()
        .ok_or_else(|| Error::parse("repeated key with no values"))
}

/// Parse a number with the host's numeric coercion rules.
///
/// Whitespace around the number is ignored, an empty string is zero and
/// `Infinity` is accepted. `NaN` is not a number here.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
        }
    }
    let lowered = s.to_ascii_lowercase();
    if lowered.contains("inf") || lowered.contains("nan") {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Parse a date-only, local date-time (read as UTC) or RFC 3339 string.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Strings, passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrCodec;

impl Codec for StrCodec {
    type Value = String;

    fn serialize(&self, value: &String) -> Option<QueryValue> {
        Some(QueryValue::Single(value.clone()))
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<String> {
        first(raw).map(str::to_string)
    }

    fn empty(&self) -> String {
        String::new()
    }

    fn to_dynamic(&self, value: &String) -> Option<Value> {
        Some(Value::String(value.clone()))
    }
}

/// Numbers. `NaN` has no query representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumCodec;

impl Codec for NumCodec {
    type Value = f64;

    fn serialize(&self, value: &f64) -> Option<QueryValue> {
        if value.is_nan() {
            return None;
        }
        Some(QueryValue::Single(format_number(*value)))
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<f64> {
        let s = first(raw)?;
        parse_number(s).ok_or_else(|| Error::parse(format!("not a number: {}", s)))
    }

    fn empty(&self) -> f64 {
        0.0
    }

    fn to_dynamic(&self, value: &f64) -> Option<Value> {
        Some(Value::Number(*value))
    }
}

/// Booleans, spelled `true` or `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl Codec for BoolCodec {
    type Value = bool;

    fn serialize(&self, value: &bool) -> Option<QueryValue> {
        Some(QueryValue::Single(value.to_string()))
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<bool> {
        match first(raw)? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(Error::parse(format!("not a boolean: {}", other))),
        }
    }

    fn empty(&self) -> bool {
        false
    }

    fn to_dynamic(&self, value: &bool) -> Option<Value> {
        Some(Value::Bool(*value))
    }
}

/// Dates as `YYYY-MM-DD`, or `YYYY-MM-DDTHH:MM:SS` with `with_time`.
///
/// The empty value is the current instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec {
    pub with_time: bool,
}

impl DateCodec {
    pub fn date_only() -> Self {
        Self { with_time: false }
    }

    pub fn with_time() -> Self {
        Self { with_time: true }
    }
}

impl Codec for DateCodec {
    type Value = DateTime<Utc>;

    fn serialize(&self, value: &DateTime<Utc>) -> Option<QueryValue> {
        let format = if self.with_time {
            "%Y-%m-%dT%H:%M:%S"
        } else {
            "%Y-%m-%d"
        };
        Some(QueryValue::Single(value.format(format).to_string()))
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<DateTime<Utc>> {
        let s = first(raw)?;
        parse_date(s).ok_or_else(|| Error::parse(format!("not a date: {}", s)))
    }

    fn empty(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// JSON objects, encoded with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordCodec;

impl Codec for JsonRecordCodec {
    type Value = serde_json::Map<String, serde_json::Value>;

    fn serialize(&self, value: &Self::Value) -> Option<QueryValue> {
        serde_json::to_string(value).ok().map(QueryValue::Single)
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<Self::Value> {
        let parsed: serde_json::Value =
            serde_json::from_str(first(raw)?).map_err(|e| Error::parse(e.to_string()))?;
        match parsed {
            serde_json::Value::Object(record) => Ok(record),
            other => Err(Error::parse(format!("not a JSON record: {}", other))),
        }
    }

    fn empty(&self) -> Self::Value {
        serde_json::Map::new()
    }
}

/// Lists of strings, one repeated key per element.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrArrCodec;

impl Codec for StrArrCodec {
    type Value = Vec<String>;

    fn serialize(&self, value: &Vec<String>) -> Option<QueryValue> {
        Some(QueryValue::Multi(value.clone()))
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<Vec<String>> {
        Ok(raw.to_vec())
    }

    fn empty(&self) -> Vec<String> {
        Vec::new()
    }

    fn to_dynamic(&self, value: &Vec<String>) -> Option<Value> {
        Some(Value::Array(value.iter().cloned().map(Value::String).collect()))
    }
}

/// Lists of numbers. Non-numeric elements are dropped on the way in, `NaN`
/// elements on the way out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumArrCodec;

impl Codec for NumArrCodec {
    type Value = Vec<f64>;

    fn serialize(&self, value: &Vec<f64>) -> Option<QueryValue> {
        Some(QueryValue::Multi(
            value
                .iter()
                .filter(|n| !n.is_nan())
                .map(|n| format_number(*n))
                .collect(),
        ))
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<Vec<f64>> {
        Ok(raw.to_vec().iter().filter_map(|s| parse_number(s)).collect())
    }

    fn empty(&self) -> Vec<f64> {
        Vec::new()
    }

    fn to_dynamic(&self, value: &Vec<f64>) -> Option<Value> {
        Some(Value::Array(value.iter().copied().map(Value::Number).collect()))
    }
}

/// Free-form values, serialized by the generic base codec.
///
/// Raw query values come back as strings (or a list of strings); there is
/// no type to parse them into.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec;

impl Codec for ValueCodec {
    type Value = Value;

    fn serialize(&self, value: &Value) -> Option<QueryValue> {
        base_serialize(value)
    }

    fn deserialize(&self, raw: &QueryValue) -> Result<Value> {
        Ok(match raw {
            QueryValue::Single(s) => Value::String(s.clone()),
            QueryValue::Multi(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        })
    }

    fn empty(&self) -> Value {
        Value::Undefined
    }

    fn to_dynamic(&self, value: &Value) -> Option<Value> {
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn single(s: &str) -> QueryValue {
        QueryValue::from(s)
    }

    #[test]
    fn str_codec() {
        let codec = StrCodec;
        assert_eq!(codec.serialize(&"abc".to_string()), Some(single("abc")));
        assert_eq!(codec.deserialize(&single("abc")).unwrap(), "abc");
        assert_eq!(codec.deserialize(&vec!["x", "y"].into()).unwrap(), "x");
        assert!(codec.deserialize(&QueryValue::Multi(Vec::new())).is_err());
        assert_eq!(codec.empty(), "");
    }

    #[test]
    fn num_codec() {
        let codec = NumCodec;
        assert_eq!(codec.serialize(&1.0), Some(single("1")));
        assert_eq!(codec.serialize(&2.5), Some(single("2.5")));
        assert_eq!(codec.serialize(&f64::NAN), None);
        assert_eq!(codec.serialize(&f64::INFINITY), Some(single("Infinity")));

        assert_eq!(codec.deserialize(&single("456")).unwrap(), 456.0);
        assert_eq!(codec.deserialize(&vec!["789", "xyz"].into()).unwrap(), 789.0);
        assert!(codec.deserialize(&single("abc")).is_err());
        assert!(codec.deserialize(&vec!["abc", "1"].into()).is_err());
        assert_eq!(codec.empty(), 0.0);
    }

    #[test]
    fn number_parsing_follows_host_coercion() {
        assert_eq!(parse_number(" 12 "), Some(12.0));
        assert_eq!(parse_number(""), Some(0.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_number("0x1f"), Some(31.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("12px"), None);
    }

    #[test]
    fn bool_codec() {
        let codec = BoolCodec;
        assert_eq!(codec.serialize(&true), Some(single("true")));
        assert!(!codec.deserialize(&single("false")).unwrap());
        assert!(codec.deserialize(&vec!["true", "false"].into()).unwrap());
        assert!(codec.deserialize(&single("yes")).is_err());
        assert!(codec.deserialize(&single("TRUE")).is_err());
    }

    #[test]
    fn date_codec() {
        let date = Utc.with_ymd_and_hms(2020, 1, 3, 12, 0, 0).unwrap();
        assert_eq!(DateCodec::date_only().serialize(&date), Some(single("2020-01-03")));
        assert_eq!(
            DateCodec::with_time().serialize(&date),
            Some(single("2020-01-03T12:00:00"))
        );

        let codec = DateCodec::default();
        assert_eq!(
            codec.deserialize(&single("2020-01-03")).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 3, 0, 0, 0).unwrap()
        );
        assert_eq!(
            codec.deserialize(&vec!["2020-01-04", "2020-01-05"].into()).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 4, 0, 0, 0).unwrap()
        );
        assert_eq!(codec.deserialize(&single("2020-01-03T12:00:00")).unwrap(), date);
        assert_eq!(codec.deserialize(&single("2020-01-03T12:00:00Z")).unwrap(), date);
        assert!(codec.deserialize(&single("not a date")).is_err());
        assert!(codec.deserialize(&single("2020-13-01")).is_err());
    }

    #[test]
    fn json_record_codec() {
        let codec = JsonRecordCodec;
        let record = json!({"a": 1, "b": 2}).as_object().cloned().unwrap();
        assert_eq!(codec.serialize(&record), Some(single(r#"{"a":1,"b":2}"#)));
        assert_eq!(codec.deserialize(&single(r#"{"a":1,"b":2}"#)).unwrap(), record);
        assert_eq!(
            codec.deserialize(&vec![r#"{"a":1,"b":2}"#, "{}"].into()).unwrap(),
            record
        );
        assert!(codec.deserialize(&single("{not json")).is_err());
        assert!(codec.deserialize(&single("[1,2]")).is_err());
        assert!(codec.deserialize(&single("null")).is_err());
        assert!(codec.empty().is_empty());
    }

    #[test]
    fn str_arr_codec() {
        let codec = StrArrCodec;
        let values = vec!["a".to_string(), "b".to_string()];
        assert_eq!(codec.serialize(&values), Some(vec!["a", "b"].into()));
        assert_eq!(codec.deserialize(&vec!["a", "b"].into()).unwrap(), values);
        assert_eq!(codec.deserialize(&single("a")).unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn num_arr_codec() {
        let codec = NumArrCodec;
        assert_eq!(
            codec.serialize(&vec![1.0, f64::NAN, 2.5]),
            Some(vec!["1", "2.5"].into())
        );
        assert_eq!(
            codec.deserialize(&vec!["1", "x", "2"].into()).unwrap(),
            vec![1.0, 2.0]
        );
        assert_eq!(codec.deserialize(&single("3")).unwrap(), vec![3.0]);
    }

    #[test]
    fn value_codec_exposes_dynamic_value() {
        let codec = ValueCodec;
        let value = Value::from(vec![1, 2]);
        assert_eq!(codec.to_dynamic(&value), Some(value.clone()));
        assert_eq!(codec.serialize(&value), Some(vec!["1", "2"].into()));
        assert_eq!(
            codec.deserialize(&vec!["1", "2"].into()).unwrap(),
            Value::from(vec!["1", "2"])
        );
    }

    #[test]
    fn typed_codecs_expose_dynamic_values() {
        assert_eq!(
            StrCodec.to_dynamic(&"x".to_string()),
            Some(Value::String("x".into()))
        );
        assert_eq!(NumCodec.to_dynamic(&2.5), Some(Value::Number(2.5)));
        assert_eq!(BoolCodec.to_dynamic(&true), Some(Value::Bool(true)));
        assert_eq!(
            StrArrCodec.to_dynamic(&vec!["a".to_string()]),
            Some(Value::Array(vec![Value::String("a".into())]))
        );
        assert_eq!(
            NumArrCodec.to_dynamic(&vec![1.0]),
            Some(Value::Array(vec![Value::Number(1.0)]))
        );

        let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(DateCodec::date_only().to_dynamic(&date), None);
        assert_eq!(JsonRecordCodec.to_dynamic(&serde_json::Map::new()), None);
    }

    #[test]
    fn default_resolution_precedence() {
        let explicit = FieldValue::Present(456.0);
        assert_eq!(
            resolve_default(&NumCodec, Some(&explicit), Nullability::Nullable),
            explicit
        );
        assert_eq!(
            resolve_default(&NumCodec, None, Nullability::Nullable),
            FieldValue::Null
        );
        assert_eq!(
            resolve_default(&NumCodec, None, Nullability::Optional),
            FieldValue::Undefined
        );
        assert_eq!(
            resolve_default(&NumCodec, None, Nullability::Required),
            FieldValue::Present(0.0)
        );
        assert_eq!(
            resolve_default(&JsonRecordCodec, None, Nullability::Required),
            FieldValue::Present(serde_json::Map::new())
        );
    }

    /// A caller-defined codec for an enum, as a host application would add.
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum SortOrder {
        Asc,
        Desc,
    }

    struct SortOrderCodec;

    impl Codec for SortOrderCodec {
        type Value = SortOrder;

        fn serialize(&self, value: &SortOrder) -> Option<QueryValue> {
            Some(single(match value {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            }))
        }

        fn deserialize(&self, raw: &QueryValue) -> Result<SortOrder> {
            match first(raw)? {
                "asc" => Ok(SortOrder::Asc),
                "desc" => Ok(SortOrder::Desc),
                other => Err(Error::parse(format!("unknown order: {}", other))),
            }
        }

        fn empty(&self) -> SortOrder {
            SortOrder::Asc
        }
    }

    #[test]
    fn custom_codec() {
        let codec = SortOrderCodec;
        assert_eq!(codec.serialize(&SortOrder::Desc), Some(single("desc")));
        assert_eq!(codec.deserialize(&single("asc")).unwrap(), SortOrder::Asc);
        assert!(codec.deserialize(&single("sideways")).is_err());
        assert_eq!(
            resolve_default(&codec, None, Nullability::Required),
            FieldValue::Present(SortOrder::Asc)
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_num_roundtrip(n in -1.0e15f64..1.0e15) {
                let raw = NumCodec.serialize(&n).unwrap();
                prop_assert_eq!(NumCodec.deserialize(&raw).unwrap(), n);
            }

            #[test]
            fn prop_str_roundtrip(s in ".*") {
                let raw = StrCodec.serialize(&s).unwrap();
                prop_assert_eq!(StrCodec.deserialize(&raw).unwrap(), s);
            }

            #[test]
            fn prop_date_roundtrip_to_second(secs in 0i64..4_102_444_800) {
                let date = DateTime::from_timestamp(secs, 0).unwrap();
                let codec = DateCodec::with_time();
                let raw = codec.serialize(&date).unwrap();
                prop_assert_eq!(codec.deserialize(&raw).unwrap(), date);
            }

            #[test]
            fn prop_num_arr_roundtrip(values in prop::collection::vec(-1.0e9f64..1.0e9, 0..6)) {
                let raw = NumArrCodec.serialize(&values).unwrap();
                prop_assert_eq!(NumArrCodec.deserialize(&raw).unwrap(), values);
            }
        }
    }
}
