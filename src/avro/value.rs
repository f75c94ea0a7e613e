//! Dynamic row values.
//!
//! Rows cross the SQLite/Avro boundary as string-keyed maps of dynamically
//! typed values ([`Row`]). Callers that know their schema at compile time
//! can bridge to concrete structs through serde with [`row_to_typed`] and
//! [`typed_to_row`].

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// A single row: column name to dynamically typed value.
pub type Row = BTreeMap<String, Value>;

/// A dynamically typed value as stored by SQLite or carried by Avro.
///
/// The variants mirror the Avro primitives the type mapper can produce:
/// SQLite integers are always widened to 64 bits and reals to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL / Avro `null`.
    Null,
    /// 64-bit signed integer (Avro `long`).
    Long(i64),
    /// 64-bit float (Avro `double`).
    Double(f64),
    /// UTF-8 text (Avro `string`).
    Text(String),
    /// Raw bytes (Avro `bytes`).
    Bytes(Vec<u8>),
    /// Boolean (Avro `boolean`).
    Boolean(bool),
}

impl Value {
    /// Short name of the variant, used in coercion error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Text(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Boolean(_) => "boolean",
        }
    }

    /// Renders the value as a JSON value.
    ///
    /// Bytes become an array of numbers, which is what serde derives
    /// expect for `Vec<u8>` fields.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Long(i) => serde_json::Value::from(*i),
            Self::Double(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::from(s.clone()),
            Self::Bytes(b) => serde_json::Value::from(b.clone()),
            Self::Boolean(b) => serde_json::Value::from(*b),
        }
    }

    /// Renders the value the way Avro schema JSON spells field defaults.
    ///
    /// Identical to [`Value::to_json`] except for bytes, which the Avro
    /// specification writes as a string whose code points are the byte
    /// values (latin-1).
    #[must_use]
    pub fn to_default_json(&self) -> serde_json::Value {
        match self {
            Self::Bytes(b) => {
                serde_json::Value::from(b.iter().map(|&byte| char::from(byte)).collect::<String>())
            },
            other => other.to_json(),
        }
    }

    /// Converts a JSON value back into a dynamic value.
    ///
    /// `field` names the originating row key for error context. Nested
    /// objects and mixed arrays have no Avro-primitive counterpart and
    /// are rejected.
    pub fn from_json(field: &str, json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Long(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Double(f))
                } else {
                    Err(Error::Coercion {
                        field: field.to_string(),
                        expected: "long or double".to_string(),
                        actual: n.to_string(),
                    })
                }
            },
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Array(items) => {
                let bytes = items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| Error::Coercion {
                                field: field.to_string(),
                                expected: "byte array".to_string(),
                                actual: "array with non-byte elements".to_string(),
                            })
                    })
                    .collect::<Result<Vec<u8>>>()?;
                Ok(Self::Bytes(bytes))
            },
            serde_json::Value::Object(_) => Err(Error::Coercion {
                field: field.to_string(),
                expected: "scalar avro value".to_string(),
                actual: "object".to_string(),
            }),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Long(i) => serializer.serialize_i64(*i),
            Self::Double(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.collect_seq(b.iter()),
            Self::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json("<value>", &json).map_err(serde::de::Error::custom)
    }
}

impl From<rusqlite::types::Value> for Value {
    fn from(value: rusqlite::types::Value) -> Self {
        match value {
            rusqlite::types::Value::Null => Self::Null,
            rusqlite::types::Value::Integer(i) => Self::Long(i),
            rusqlite::types::Value::Real(f) => Self::Double(f),
            rusqlite::types::Value::Text(s) => Self::Text(s),
            rusqlite::types::Value::Blob(b) => Self::Bytes(b),
        }
    }
}

impl From<Value> for rusqlite::types::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Long(i) => Self::Integer(i),
            Value::Double(f) => Self::Real(f),
            Value::Text(s) => Self::Text(s),
            Value::Bytes(b) => Self::Blob(b),
            Value::Boolean(b) => Self::Integer(i64::from(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Deserializes a dynamic row into a concrete struct.
///
/// # Errors
///
/// Returns an error if the row's shape does not match `T`.
pub fn row_to_typed<T: DeserializeOwned>(row: &Row) -> Result<T> {
    let object = row
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect::<serde_json::Map<String, serde_json::Value>>();
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

/// Serializes a concrete struct into a dynamic row.
///
/// # Errors
///
/// Returns an error if `T` does not serialize to a flat object of
/// Avro-primitive values.
pub fn typed_to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(object) => object
            .into_iter()
            .map(|(name, json)| {
                let value = Value::from_json(&name, &json)?;
                Ok((name, value))
            })
            .collect(),
        other => Err(Error::Coercion {
            field: "<root>".to_string(),
            expected: "object".to_string(),
            actual: other.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reminder {
        id: i64,
        title: String,
        done: bool,
    }

    #[test]
    fn test_typed_round_trip() {
        let reminder = Reminder {
            id: 7,
            title: "water the plants".to_string(),
            done: false,
        };

        let row = typed_to_row(&reminder).unwrap();
        assert_eq!(row.get("id"), Some(&Value::Long(7)));
        assert_eq!(row.get("title"), Some(&Value::Text("water the plants".to_string())));
        assert_eq!(row.get("done"), Some(&Value::Boolean(false)));

        let back: Reminder = row_to_typed(&row).unwrap();
        assert_eq!(back, reminder);
    }

    #[test]
    fn test_from_json_rejects_objects() {
        let json = serde_json::json!({"nested": 1});
        let err = Value::from_json("payload", &json).unwrap_err();
        assert!(matches!(err, Error::Coercion { field, .. } if field == "payload"));
    }

    #[test]
    fn test_bytes_default_json_is_latin1_string() {
        let value = Value::Bytes(vec![0x41, 0x00, 0xFF]);
        assert_eq!(
            value.to_default_json(),
            serde_json::Value::from("A\u{0}\u{ff}")
        );
    }

    #[test]
    fn test_sqlite_value_conversion() {
        let native: Value = rusqlite::types::Value::Integer(42).into();
        assert_eq!(native, Value::Long(42));

        let bound: rusqlite::types::Value = Value::Boolean(true).into();
        assert_eq!(bound, rusqlite::types::Value::Integer(1));
    }
}
