//! Field declarations and the registry the engine reconciles.
//!
//! A host declares one [`Param`] per tracked query key on every observation:
//! the field's current value, the callback that updates it, and optionally a
//! custom serializer pair, a default value and its nullability. Declarations
//! are rebuilt on every cycle; the engine never holds on to them.
//!
//! [`Params`] keys the declarations. Keys it holds are *controlled*; every
//! other key found in the URL is *uncontrolled* and passes through untouched.

use crate::{
    codec::{
        resolve_default, BoolCodec, Codec, DateCodec, FieldValue, JsonRecordCodec, Nullability,
        NumArrCodec, NumCodec, StrArrCodec, StrCodec, ValueCodec,
    },
    error::Result,
    Query, QueryKey, QueryValue, SerializeFn, Value,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fmt;

type OnChange<'a, T> = Box<dyn FnMut(FieldValue<T>) + 'a>;
type OnReset<'a> = Box<dyn FnMut() + 'a>;
type CustomSerialize<'a, T> = Box<dyn Fn(&FieldValue<T>) -> Option<QueryValue> + 'a>;
type CustomDeserialize<'a, T> = Box<dyn Fn(&QueryValue) -> Result<FieldValue<T>> + 'a>;

/// Type-erased field declaration.
pub trait QueryParam {
    /// Serialized form of the current value, `None` to leave the key out.
    ///
    /// A field-level serializer wins. Otherwise the value goes through
    /// `global` when the adapter supplies one and the codec exposes a
    /// dynamic view of it, and through its codec in every other case.
    fn serialize(&self, global: Option<&SerializeFn>) -> Option<QueryValue>;

    /// Deserialize `raw` and hand the result to the field's change callback.
    ///
    /// On failure the callback is not invoked.
    fn apply(&mut self, raw: &QueryValue) -> Result<()>;

    /// Put the field back to its default value.
    fn reset(&mut self);
}

/// A typed field declaration.
pub struct Param<'a, C: Codec> {
    codec: C,
    value: FieldValue<C::Value>,
    on_change: OnChange<'a, C::Value>,
    on_reset: Option<OnReset<'a>>,
    serialize: Option<CustomSerialize<'a, C::Value>>,
    deserialize: Option<CustomDeserialize<'a, C::Value>>,
    default_value: Option<FieldValue<C::Value>>,
    nullability: Nullability,
}

impl<'a, C: Codec> Param<'a, C> {
    /// Declare a field with an explicit codec.
    pub fn new(
        codec: C,
        value: impl Into<FieldValue<C::Value>>,
        on_change: impl FnMut(FieldValue<C::Value>) + 'a,
    ) -> Self {
        Self {
            codec,
            value: value.into(),
            on_change: Box::new(on_change),
            on_reset: None,
            serialize: None,
            deserialize: None,
            default_value: None,
            nullability: Nullability::Required,
        }
    }

    /// Replace the default reset behaviour.
    pub fn on_reset(mut self, on_reset: impl FnMut() + 'a) -> Self {
        self.on_reset = Some(Box::new(on_reset));
        self
    }

    /// Custom serializer. Must be the exact inverse of the deserializer.
    pub fn serialize(
        mut self,
        serialize: impl Fn(&FieldValue<C::Value>) -> Option<QueryValue> + 'a,
    ) -> Self {
        self.serialize = Some(Box::new(serialize));
        self
    }

    /// Custom deserializer. Must be the exact inverse of the serializer.
    pub fn deserialize(
        mut self,
        deserialize: impl Fn(&QueryValue) -> Result<FieldValue<C::Value>> + 'a,
    ) -> Self {
        self.deserialize = Some(Box::new(deserialize));
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue<C::Value>>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullability = Nullability::Nullable;
        self
    }

    /// Mark the field optional. A field that is already nullable stays
    /// nullable, since `null` takes precedence on reset.
    pub fn optional(mut self) -> Self {
        if self.nullability == Nullability::Required {
            self.nullability = Nullability::Optional;
        }
        self
    }

    pub fn value(&self) -> &FieldValue<C::Value> {
        &self.value
    }

    /// The value this field resets to.
    pub fn reset_value(&self) -> FieldValue<C::Value> {
        resolve_default(&self.codec, self.default_value.as_ref(), self.nullability)
    }
}

impl<'a> Param<'a, StrCodec> {
    pub fn string(
        value: impl Into<FieldValue<String>>,
        on_change: impl FnMut(FieldValue<String>) + 'a,
    ) -> Self {
        Param::new(StrCodec, value, on_change)
    }
}

impl<'a> Param<'a, NumCodec> {
    pub fn number(
        value: impl Into<FieldValue<f64>>,
        on_change: impl FnMut(FieldValue<f64>) + 'a,
    ) -> Self {
        Param::new(NumCodec, value, on_change)
    }
}

impl<'a> Param<'a, BoolCodec> {
    pub fn boolean(
        value: impl Into<FieldValue<bool>>,
        on_change: impl FnMut(FieldValue<bool>) + 'a,
    ) -> Self {
        Param::new(BoolCodec, value, on_change)
    }
}

impl<'a> Param<'a, DateCodec> {
    /// Date serialized as `YYYY-MM-DD`.
    pub fn date(
        value: impl Into<FieldValue<DateTime<Utc>>>,
        on_change: impl FnMut(FieldValue<DateTime<Utc>>) + 'a,
    ) -> Self {
        Param::new(DateCodec::date_only(), value, on_change)
    }

    /// Date serialized as `YYYY-MM-DDTHH:MM:SS`.
    pub fn date_time(
        value: impl Into<FieldValue<DateTime<Utc>>>,
        on_change: impl FnMut(FieldValue<DateTime<Utc>>) + 'a,
    ) -> Self {
        Param::new(DateCodec::with_time(), value, on_change)
    }
}

impl<'a> Param<'a, JsonRecordCodec> {
    pub fn json_record(
        value: impl Into<FieldValue<serde_json::Map<String, serde_json::Value>>>,
        on_change: impl FnMut(FieldValue<serde_json::Map<String, serde_json::Value>>) + 'a,
    ) -> Self {
        Param::new(JsonRecordCodec, value, on_change)
    }
}

impl<'a> Param<'a, StrArrCodec> {
    pub fn string_list(
        value: impl Into<FieldValue<Vec<String>>>,
        on_change: impl FnMut(FieldValue<Vec<String>>) + 'a,
    ) -> Self {
        Param::new(StrArrCodec, value, on_change)
    }
}

impl<'a> Param<'a, NumArrCodec> {
    pub fn number_list(
        value: impl Into<FieldValue<Vec<f64>>>,
        on_change: impl FnMut(FieldValue<Vec<f64>>) + 'a,
    ) -> Self {
        Param::new(NumArrCodec, value, on_change)
    }
}

impl<'a> Param<'a, ValueCodec> {
    /// Free-form field serialized by the base codec.
    pub fn value_of(
        value: impl Into<FieldValue<Value>>,
        on_change: impl FnMut(FieldValue<Value>) + 'a,
    ) -> Self {
        Param::new(ValueCodec, value, on_change)
    }
}

impl<'a, C: Codec> QueryParam for Param<'a, C> {
    fn serialize(&self, global: Option<&SerializeFn>) -> Option<QueryValue> {
        if let Some(serialize) = &self.serialize {
            return serialize(&self.value);
        }
        let value = self.value.as_present()?;
        if let (Some(global), Some(dynamic)) = (global, self.codec.to_dynamic(value)) {
            return global(&dynamic);
        }
        self.codec.serialize(value)
    }

    fn apply(&mut self, raw: &QueryValue) -> Result<()> {
        let value = match &self.deserialize {
            Some(deserialize) => deserialize(raw)?,
            None => FieldValue::Present(self.codec.deserialize(raw)?),
        };
        (self.on_change)(value);
        Ok(())
    }

    fn reset(&mut self) {
        match self.on_reset.as_mut() {
            Some(on_reset) => on_reset(),
            None => {
                let value = self.reset_value();
                (self.on_change)(value);
            }
        }
    }
}

/// The set of fields declared for one binding, in declaration order.
#[derive(Default)]
pub struct Params<'a> {
    fields: IndexMap<QueryKey, Box<dyn QueryParam + 'a>>,
}

impl<'a> Params<'a> {
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Declare a field. Re-declaring a key replaces the earlier declaration.
    pub fn insert(&mut self, key: impl Into<QueryKey>, param: impl QueryParam + 'a) -> &mut Self {
        self.fields.insert(key.into(), Box::new(param));
        self
    }

    /// Builder-style [`Params::insert`].
    pub fn with(mut self, key: impl Into<QueryKey>, param: impl QueryParam + 'a) -> Self {
        self.insert(key, param);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `key` is controlled by this binding.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Controlled keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.fields.keys()
    }

    /// Keys of `query` this binding does not declare.
    pub fn uncontrolled_keys(&self, query: &Query) -> Vec<QueryKey> {
        query
            .keys()
            .filter(|key| !self.contains(key))
            .cloned()
            .collect()
    }

    /// Serialized form of one field.
    pub fn serialize_field(&self, key: &str, global: Option<&SerializeFn>) -> Option<QueryValue> {
        self.fields.get(key)?.serialize(global)
    }

    /// The query the declared fields serialize to. Fields whose value has no
    /// query representation are left out.
    pub fn serialize_state(&self, global: Option<&SerializeFn>) -> Query {
        self.fields
            .iter()
            .filter_map(|(key, param)| param.serialize(global).map(|v| (key.clone(), v)))
            .collect()
    }

    /// Pull `raw` into the field declared under `key`.
    ///
    /// Returns `Ok(false)` when the key is not controlled.
    pub fn apply(&mut self, key: &str, raw: &QueryValue) -> Result<bool> {
        match self.fields.get_mut(key) {
            Some(param) => param.apply(raw).map(|_| true).map_err(|e| e.with_key(key)),
            None => Ok(false),
        }
    }

    /// Reset the field declared under `key`. Returns whether it exists.
    pub fn reset(&mut self, key: &str) -> bool {
        match self.fields.get_mut(key) {
            Some(param) => {
                param.reset();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Params<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Params")
            .field("keys", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Default> FieldValue<T> {
    /// The present value, or `T::default()` for `null` and undefined.
    pub fn unwrap_or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}
