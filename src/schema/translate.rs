//! Table schema to Avro record schema translation.

use crate::avro::{AvroField, AvroSchema, AvroType, RecordSchema};
use crate::schema::{StorageType, TableSchema};
use crate::{Error, Result};

/// Namespace of every record schema this crate produces.
pub const RECORD_NAMESPACE: &str = "io.avrolite";

/// Maps a storage class and nullability to an Avro schema.
///
/// Storage classes widen to the broadest compatible Avro primitive; the
/// source store has no fixed-width numerics, so every integer becomes a
/// `long` and every real a `double`. Nullable columns become a null-first
/// two-way union — the branch order is part of the wire identity, so it
/// is fixed here and nowhere else.
#[must_use]
pub fn map_type(storage: StorageType, nullable: bool) -> AvroSchema {
    let primitive = match storage {
        StorageType::Null => AvroType::Null,
        StorageType::Integer => AvroType::Long,
        StorageType::Real => AvroType::Double,
        StorageType::Text => AvroType::String,
        StorageType::Blob => AvroType::Bytes,
        StorageType::Boolean => AvroType::Boolean,
    };
    // ["null", "null"] is not a legal union; a nullable null column is
    // just null.
    if nullable && primitive != AvroType::Null {
        AvroSchema::Union(vec![
            AvroSchema::Primitive(AvroType::Null),
            AvroSchema::Primitive(primitive),
        ])
    } else {
        AvroSchema::Primitive(primitive)
    }
}

/// Translates a table schema into a named Avro record schema.
///
/// Fields are translated in declaration order, each carrying its resolved
/// default. Two structurally equal table schemas always translate to
/// fingerprint-identical record schemas.
///
/// # Errors
///
/// Returns [`Error::RecordConstruction`] when the field name set is
/// invalid (duplicates, empty names).
pub fn translate(schema: &TableSchema) -> Result<RecordSchema> {
    let mut fields = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let field_schema = map_type(field.storage, field.nullable);
        fields.push(AvroField::new(
            field.name.clone(),
            field_schema,
            field.resolved_default(),
        ));
    }
    RecordSchema::new(schema.table.clone(), RECORD_NAMESPACE.to_string(), fields).map_err(|e| {
        match e {
            Error::RecordConstruction(cause) => Error::RecordConstruction(format!(
                "table '{}': {cause}",
                schema.table
            )),
            other => other,
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::avro::Value;
    use crate::schema::Field;
    use test_case::test_case;

    #[test_case(StorageType::Null, AvroType::Null)]
    #[test_case(StorageType::Integer, AvroType::Long)]
    #[test_case(StorageType::Real, AvroType::Double)]
    #[test_case(StorageType::Text, AvroType::String)]
    #[test_case(StorageType::Blob, AvroType::Bytes)]
    #[test_case(StorageType::Boolean, AvroType::Boolean)]
    fn test_mapping_table(storage: StorageType, want: AvroType) {
        assert_eq!(map_type(storage, false), AvroSchema::Primitive(want));
    }

    #[test_case(StorageType::Integer, AvroType::Long)]
    #[test_case(StorageType::Real, AvroType::Double)]
    #[test_case(StorageType::Text, AvroType::String)]
    #[test_case(StorageType::Blob, AvroType::Bytes)]
    #[test_case(StorageType::Boolean, AvroType::Boolean)]
    fn test_nullable_unions_are_null_first(storage: StorageType, want: AvroType) {
        assert_eq!(
            map_type(storage, true),
            AvroSchema::Union(vec![
                AvroSchema::Primitive(AvroType::Null),
                AvroSchema::Primitive(want),
            ])
        );
    }

    #[test]
    fn test_nullable_null_stays_bare() {
        assert_eq!(map_type(StorageType::Null, true), AvroSchema::Primitive(AvroType::Null));
    }

    fn foo_schema() -> TableSchema {
        TableSchema::new(
            "foo".to_string(),
            vec![
                Field::new("id".to_string(), StorageType::Integer, false, Some(Value::Long(0))),
                Field::new(
                    "name".to_string(),
                    StorageType::Text,
                    false,
                    Some(Value::Text("meatballs".to_string())),
                ),
            ],
            String::new(),
        )
    }

    #[test]
    fn test_translate_foo_fingerprint() {
        // The concrete scenario: foo(id integer default 0, name text
        // default "meatballs") must fingerprint identically to the same
        // schema written out as JSON text.
        let record = translate(&foo_schema()).unwrap();
        let textual = AvroSchema::parse(
            r#"{"name":"io.avrolite.foo","type":"record","fields":[{"name":"id","type":"long","default":0},{"name":"name","type":"string","default":"meatballs"}]}"#,
        )
        .unwrap();
        assert_eq!(record.fingerprint(), textual.fingerprint());
    }

    #[test]
    fn test_translate_is_deterministic() {
        let first = translate(&foo_schema()).unwrap();
        let second = translate(&foo_schema()).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.to_json_string(), second.to_json_string());
    }

    #[test]
    fn test_translate_rejects_duplicate_columns() {
        let schema = TableSchema::new(
            "foo".to_string(),
            vec![
                Field::new("id".to_string(), StorageType::Integer, false, None),
                Field::new("id".to_string(), StorageType::Text, false, None),
            ],
            String::new(),
        );
        let err = translate(&schema).unwrap_err();
        assert!(matches!(err, Error::RecordConstruction(cause) if cause.contains("foo")));
    }

    #[test]
    fn test_nullable_field_never_carries_default() {
        let schema = TableSchema::new(
            "foo".to_string(),
            vec![Field::new(
                "id".to_string(),
                StorageType::Integer,
                true,
                Some(Value::Long(7)),
            )],
            String::new(),
        );
        let record = translate(&schema).unwrap();
        assert_eq!(record.fields[0].default, None);
    }
}
