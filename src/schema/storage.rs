//! SQLite storage classes.

use crate::avro::Value;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The declared storage class of a SQLite column.
///
/// Constructed from the lower-cased type text the catalog reports; any
/// other declaration (`varchar(20)`, `datetime`, ...) is rejected rather
/// than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// The NULL storage class.
    Null,
    /// 64-bit signed integers.
    Integer,
    /// 64-bit floats.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// Booleans, stored by SQLite as integers.
    Boolean,
}

impl StorageType {
    /// Parses a lower-cased catalog type string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] for anything outside the six
    /// supported storage classes.
    pub fn from_catalog(text: &str) -> Result<Self> {
        match text {
            "null" => Ok(Self::Null),
            "integer" => Ok(Self::Integer),
            "real" => Ok(Self::Real),
            "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            "boolean" => Ok(Self::Boolean),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }

    /// The storage class's lower-cased name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::Boolean => "boolean",
        }
    }

    /// The fixed fallback default for this storage class.
    ///
    /// Used when a programmatically supplied default does not match the
    /// column's type; see [`Field::resolved_default`](crate::schema::Field::resolved_default).
    #[must_use]
    pub const fn zero_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer => Value::Long(0),
            Self::Real => Value::Double(0.0),
            Self::Text => Value::Text(String::new()),
            Self::Blob => Value::Bytes(Vec::new()),
            Self::Boolean => Value::Boolean(false),
        }
    }

    /// Parses catalog default text into the native value for this class.
    ///
    /// Integer and real text must parse exactly; boolean text is parsed
    /// as an integer and tested for nonzero; text is taken verbatim and
    /// blobs as the raw bytes of the text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DefaultParse`] when numeric or boolean text does
    /// not parse. This is a hard failure with no zero-value fallback: an
    /// unparsable default means the catalog cannot be trusted.
    pub fn parse_default(self, column: &str, text: &str) -> Result<Value> {
        let parse_failure = |cause: String| Error::DefaultParse {
            column: column.to_string(),
            storage: self.as_str().to_string(),
            text: text.to_string(),
            cause,
        };
        match self {
            Self::Null => Ok(Value::Null),
            Self::Integer => text
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|e| parse_failure(e.to_string())),
            Self::Real => text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| parse_failure(e.to_string())),
            Self::Text => Ok(Value::Text(text.to_string())),
            Self::Blob => Ok(Value::Bytes(text.as_bytes().to_vec())),
            Self::Boolean => text
                .parse::<i64>()
                .map(|i| Value::Boolean(i != 0))
                .map_err(|e| parse_failure(e.to_string())),
        }
    }
}

impl FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_catalog(s)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("null", StorageType::Null)]
    #[test_case("integer", StorageType::Integer)]
    #[test_case("real", StorageType::Real)]
    #[test_case("text", StorageType::Text)]
    #[test_case("blob", StorageType::Blob)]
    #[test_case("boolean", StorageType::Boolean)]
    fn test_catalog_names_round_trip(text: &str, storage: StorageType) {
        assert_eq!(StorageType::from_catalog(text).unwrap(), storage);
        assert_eq!(storage.as_str(), text);
    }

    #[test_case("varchar(20)")]
    #[test_case("datetime")]
    #[test_case("INTEGER"; "case sensitive, caller lower-cases")]
    #[test_case("")]
    fn test_unknown_catalog_names_rejected(text: &str) {
        let err = StorageType::from_catalog(text).unwrap_err();
        assert!(matches!(err, Error::UnknownType(t) if t == text));
    }

    #[test]
    fn test_parse_default_integer() {
        assert_eq!(
            StorageType::Integer.parse_default("id", "4").unwrap(),
            Value::Long(4)
        );
        let err = StorageType::Integer.parse_default("id", "abc").unwrap_err();
        assert!(matches!(err, Error::DefaultParse { column, .. } if column == "id"));
    }

    #[test]
    fn test_parse_default_real_and_boolean() {
        assert_eq!(
            StorageType::Real.parse_default("score", "0.762").unwrap(),
            Value::Double(0.762)
        );
        assert_eq!(
            StorageType::Boolean.parse_default("done", "4").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            StorageType::Boolean.parse_default("done", "0").unwrap(),
            Value::Boolean(false)
        );
        assert!(StorageType::Boolean.parse_default("done", "yes").is_err());
    }

    #[test]
    fn test_parse_default_text_is_identity() {
        assert_eq!(
            StorageType::Text.parse_default("name", "meatballs").unwrap(),
            Value::Text("meatballs".to_string())
        );
    }
}
