//! The per-cycle reading.

use heapless::{String, Vec};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Most fields a reading can hold.
pub const MAX_FIELDS: usize = 12;
/// Capacity of a field name.
pub const FIELD_NAME_LEN: usize = 16;
/// Capacity of a text value.
pub const TEXT_LEN: usize = 16;

/// A field name.
pub type FieldName = String<FIELD_NAME_LEN>;
/// The ordered list of fields to publish.
pub type FieldList = Vec<FieldName, MAX_FIELDS>;

/// One field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Sensor disabled, or no source for the field.
    Null,
    /// A measurement.
    Number(f32),
    /// Preformatted text such as the date.
    Text(String<TEXT_LEN>),
}

impl Value {
    /// A number, or `Null` when `v` is not finite.
    pub fn number(v: f32) -> Self {
        if v.is_finite() {
            Value::Number(v)
        } else {
            Value::Null
        }
    }

    /// A text value, or `Null` when `s` does not fit.
    pub fn text(s: &str) -> Self {
        String::try_from(s).map(Value::Text).unwrap_or(Value::Null)
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Number(v) => serializer.serialize_f32(*v),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Field → value mapping in publish order.
///
/// Built once per cycle with [`Reading::from_fields`] and never changed
/// afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reading {
    entries: Vec<(FieldName, Value), MAX_FIELDS>,
}

impl Reading {
    /// A reading with exactly the fields of `fields`, in that order.
    ///
    /// `source` supplies each field's value; fields it does not know become
    /// `Null`.
    pub fn from_fields<F>(fields: &FieldList, mut source: F) -> Self
    where
        F: FnMut(&str) -> Option<Value>,
    {
        let mut entries = Vec::new();
        for name in fields {
            let value = source(name.as_str()).unwrap_or(Value::Null);
            // capacity matches FieldList
            let _ = entries.push((name.clone(), value));
        }
        Self { entries }
    }

    /// Value of `field`, if the reading carries it.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, value)| value)
    }

    /// Fields in publish order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the reading has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as a compact JSON object into `buf`, returning the length.
    pub fn write_json(&self, buf: &mut [u8]) -> Result<usize, serde_json_core::ser::Error> {
        serde_json_core::to_slice(self, buf)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}
