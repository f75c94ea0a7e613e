//! Table schema model.
//!
//! [`TableSchema`] is the intermediate representation between the SQLite
//! catalog and the Avro record schema. It serializes to JSON for the
//! human-readable schema dumps the exporter writes next to each container
//! file, and back, so the import CLI can reconstruct a table from a dump.

use crate::avro::Value;
use crate::schema::StorageType;
use serde::{Deserialize, Serialize};

/// One column's translated description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Column name, unique within the table.
    pub name: String,

    /// Declared storage class.
    #[serde(rename = "type")]
    pub storage: StorageType,

    /// Whether the column admits NULL. Nullable columns translate to a
    /// null-first union and never carry a default.
    pub nullable: bool,

    /// Declared default value, `None` when the catalog declared none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Field {
    /// Creates a field.
    #[must_use]
    pub const fn new(
        name: String,
        storage: StorageType,
        nullable: bool,
        default: Option<Value>,
    ) -> Self {
        Self {
            name,
            storage,
            nullable,
            default,
        }
    }

    /// Resolves the default value the Avro field will carry.
    ///
    /// - nullable columns never carry a default;
    /// - a column with no declared default carries none;
    /// - a declared default of the matching native type is kept (booleans
    ///   also accept an integer, tested for nonzero);
    /// - any other mismatch falls back to the storage class's fixed zero
    ///   value rather than failing.
    #[must_use]
    pub fn resolved_default(&self) -> Option<Value> {
        if self.nullable {
            return None;
        }
        let declared = self.default.as_ref()?;
        let resolved = match (self.storage, declared) {
            (StorageType::Null, _) => Value::Null,
            (StorageType::Integer, Value::Long(_))
            | (StorageType::Real, Value::Double(_))
            | (StorageType::Text, Value::Text(_))
            | (StorageType::Blob, Value::Bytes(_))
            | (StorageType::Boolean, Value::Boolean(_)) => declared.clone(),
            (StorageType::Boolean, Value::Long(i)) => Value::Boolean(*i != 0),
            (storage, _) => storage.zero_value(),
        };
        Some(resolved)
    }
}

/// A table's schema as read from the SQLite catalog.
///
/// Constructed fresh on every schema read and consumed once per export or
/// import; an [`Enhancer`](crate::export::Enhancer) may adjust it in place
/// between the read and the translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name; becomes the Avro record's short name.
    pub table: String,

    /// Fields in column declaration order.
    pub fields: Vec<Field>,

    /// Verbatim `CREATE TABLE` statement, used by the import path to
    /// recreate the table. Opaque to translation.
    #[serde(rename = "sql", default)]
    pub creation_sql: String,
}

impl TableSchema {
    /// Creates a table schema.
    #[must_use]
    pub const fn new(table: String, fields: Vec<Field>, creation_sql: String) -> Self {
        Self {
            table,
            fields,
            creation_sql,
        }
    }

    /// Field names in declaration order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn field(storage: StorageType, nullable: bool, default: Option<Value>) -> Field {
        Field::new("id".to_string(), storage, nullable, default)
    }

    // Mirrors the fallback matrix: matching native defaults are kept,
    // mismatched ones fall back to the per-type zero value.
    #[test_case(field(StorageType::Integer, true, None), None; "nullable no default")]
    #[test_case(field(StorageType::Integer, true, Some(Value::Long(9))), None; "nullable suppresses declared default")]
    #[test_case(field(StorageType::Integer, false, None), None; "absent default stays absent")]
    #[test_case(field(StorageType::Integer, false, Some(Value::Long(4))), Some(Value::Long(4)); "integer")]
    #[test_case(field(StorageType::Real, false, Some(Value::Double(0.762))), Some(Value::Double(0.762)); "real")]
    #[test_case(field(StorageType::Text, false, Some(Value::Text(String::new()))), Some(Value::Text(String::new())); "text")]
    #[test_case(field(StorageType::Blob, false, Some(Value::Bytes(vec![1]))), Some(Value::Bytes(vec![1])); "blob")]
    #[test_case(field(StorageType::Boolean, false, Some(Value::Boolean(true))), Some(Value::Boolean(true)); "boolean")]
    #[test_case(field(StorageType::Boolean, false, Some(Value::Long(4))), Some(Value::Boolean(true)); "boolean from nonzero integer")]
    #[test_case(field(StorageType::Boolean, false, Some(Value::Long(0))), Some(Value::Boolean(false)); "boolean from zero integer")]
    #[test_case(field(StorageType::Integer, false, Some(Value::Text("meatballs".to_string()))), Some(Value::Long(0)); "integer bad default")]
    #[test_case(field(StorageType::Real, false, Some(Value::Text("meatballs".to_string()))), Some(Value::Double(0.0)); "real bad default")]
    #[test_case(field(StorageType::Text, false, Some(Value::Long(42))), Some(Value::Text(String::new())); "text bad default")]
    #[test_case(field(StorageType::Blob, false, Some(Value::Long(42))), Some(Value::Bytes(vec![])); "blob bad default")]
    #[test_case(field(StorageType::Boolean, false, Some(Value::Text("meatballs".to_string()))), Some(Value::Boolean(false)); "boolean bad default")]
    fn test_resolved_default(field: Field, want: Option<Value>) {
        assert_eq!(field.resolved_default(), want);
    }

    #[test]
    fn test_json_dump_shape() {
        let schema = TableSchema::new(
            "foo".to_string(),
            vec![
                Field::new("id".to_string(), StorageType::Integer, false, Some(Value::Long(0))),
                Field::new("name".to_string(), StorageType::Text, true, None),
            ],
            "CREATE TABLE foo (id INTEGER NOT NULL DEFAULT 0, name TEXT)".to_string(),
        );

        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(
            json,
            r#"{"table":"foo","fields":[{"name":"id","type":"integer","nullable":false,"default":0},{"name":"name","type":"text","nullable":true}],"sql":"CREATE TABLE foo (id INTEGER NOT NULL DEFAULT 0, name TEXT)"}"#
        );

        let back: TableSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
