//! Avro schema model.
//!
//! A deliberately small subset of the Avro specification: the primitives
//! the type mapper produces, null-first two-way unions for nullable
//! columns, and a single flat record per table. Schemas render to JSON for
//! container-file headers and human-readable dumps, and to the Parsing
//! Canonical Form for fingerprinting.

use crate::avro::value::Value;
use crate::schema::TableSchema;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// An Avro primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvroType {
    /// No value.
    Null,
    /// 64-bit signed integer.
    Long,
    /// 64-bit IEEE 754 float.
    Double,
    /// UTF-8 string.
    String,
    /// Variable-length byte sequence.
    Bytes,
    /// True or false.
    Boolean,
}

impl AvroType {
    /// The type's name as spelled in Avro schema JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Boolean => "boolean",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "long" => Some(Self::Long),
            "double" => Some(Self::Double),
            "string" => Some(Self::String),
            "bytes" => Some(Self::Bytes),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for AvroType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An Avro schema: a primitive, a union of primitives, or a named record.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    /// A bare primitive.
    Primitive(AvroType),
    /// A union of alternatives. The branch order is part of the schema's
    /// wire identity: union values are prefixed with the branch index.
    Union(Vec<AvroSchema>),
    /// A named record with ordered fields.
    Record(RecordSchema),
}

impl AvroSchema {
    /// Renders the schema as Avro schema JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Primitive(primitive) => serde_json::Value::from(primitive.as_str()),
            Self::Union(branches) => {
                serde_json::Value::from(branches.iter().map(Self::to_json).collect::<Vec<_>>())
            },
            Self::Record(record) => record.to_json(),
        }
    }

    /// Renders the schema's Parsing Canonical Form.
    ///
    /// The canonical form drops defaults and folds names to fullnames, so
    /// structurally equal schemas produce byte-identical text.
    #[must_use]
    pub fn canonical_form(&self) -> String {
        match self {
            Self::Primitive(primitive) => format!("\"{primitive}\""),
            Self::Union(branches) => {
                let inner = branches
                    .iter()
                    .map(Self::canonical_form)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("[{inner}]")
            },
            Self::Record(record) => record.canonical_form(),
        }
    }

    /// SHA-256 fingerprint of the Parsing Canonical Form.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_form()).into()
    }

    /// Hex rendering of [`AvroSchema::fingerprint`].
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }

    /// Parses Avro schema JSON.
    ///
    /// Supports the subset this crate produces: primitive names, unions,
    /// and records whose fields are primitives or unions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaParse`] on malformed JSON or unsupported
    /// schema features.
    pub fn parse(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::SchemaParse(format!("not valid json: {e}")))?;
        Self::from_schema_json(&json)
    }

    fn from_schema_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::String(name) => AvroType::from_name(name)
                .map(Self::Primitive)
                .ok_or_else(|| Error::SchemaParse(format!("unsupported type {name:?}"))),
            serde_json::Value::Array(branches) => Ok(Self::Union(
                branches
                    .iter()
                    .map(Self::from_schema_json)
                    .collect::<Result<Vec<_>>>()?,
            )),
            serde_json::Value::Object(attrs) => RecordSchema::from_json(attrs).map(Self::Record),
            other => Err(Error::SchemaParse(format!("unsupported schema node: {other}"))),
        }
    }
}

impl fmt::Display for AvroSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json().to_string())
    }
}

/// One named field of a record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AvroField {
    /// Field name, unique within the record.
    pub name: String,
    /// The field's schema.
    pub schema: AvroSchema,
    /// Resolved default value, `None` when the field has no default.
    pub default: Option<Value>,
}

impl AvroField {
    /// Creates a field.
    #[must_use]
    pub const fn new(name: String, schema: AvroSchema, default: Option<Value>) -> Self {
        Self {
            name,
            schema,
            default,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let mut attrs = serde_json::Map::new();
        attrs.insert("name".to_string(), serde_json::Value::from(self.name.clone()));
        attrs.insert("type".to_string(), self.schema.to_json());
        if let Some(default) = &self.default {
            attrs.insert("default".to_string(), default.to_default_json());
        }
        serde_json::Value::Object(attrs)
    }
}

/// A named Avro record schema, one field per table column.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    /// Record short name (the table name).
    pub name: String,
    /// Record namespace.
    pub namespace: String,
    /// Fields in column declaration order.
    pub fields: Vec<AvroField>,
}

impl RecordSchema {
    /// Creates a record schema, validating the field name set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordConstruction`] on duplicate or empty field
    /// names, or an empty record name.
    pub fn new(name: String, namespace: String, fields: Vec<AvroField>) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::RecordConstruction("record name is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.is_empty() {
                return Err(Error::RecordConstruction("field name is empty".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::RecordConstruction(format!(
                    "duplicate field name {:?}",
                    field.name
                )));
            }
        }
        Ok(Self {
            name,
            namespace,
            fields,
        })
    }

    /// The record's dotted fullname.
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Renders the record as Avro schema JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut attrs = serde_json::Map::new();
        attrs.insert("name".to_string(), serde_json::Value::from(self.fullname()));
        attrs.insert("type".to_string(), serde_json::Value::from("record"));
        attrs.insert(
            "fields".to_string(),
            serde_json::Value::from(self.fields.iter().map(AvroField::to_json).collect::<Vec<_>>()),
        );
        serde_json::Value::Object(attrs)
    }

    /// Compact JSON text of the schema, as embedded in container files.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Parsing Canonical Form of the record.
    #[must_use]
    pub fn canonical_form(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|field| {
                format!(
                    "{{\"name\":{},\"type\":{}}}",
                    serde_json::Value::from(field.name.clone()),
                    field.schema.canonical_form()
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{{\"name\":{},\"type\":\"record\",\"fields\":[{}]}}",
            serde_json::Value::from(self.fullname()),
            fields
        )
    }

    /// SHA-256 fingerprint of the Parsing Canonical Form.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_form()).into()
    }

    /// Derives a SQLite table schema from this record schema.
    ///
    /// The reverse direction is a declared contract only.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotImplemented`].
    pub fn to_table_schema(&self) -> Result<TableSchema> {
        Err(Error::NotImplemented("avro record to sqlite table schema"))
    }

    fn from_json(attrs: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let kind = attrs.get("type").and_then(serde_json::Value::as_str);
        if kind != Some("record") {
            return Err(Error::SchemaParse(format!(
                "expected a record schema, got type {kind:?}"
            )));
        }

        let raw_name = attrs
            .get("name")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::SchemaParse("record has no name".to_string()))?;
        // A dotted name embeds its own namespace; a bare name may carry a
        // separate namespace attribute.
        let (namespace, name) = match raw_name.rsplit_once('.') {
            Some((namespace, name)) => (namespace.to_string(), name.to_string()),
            None => (
                attrs
                    .get("namespace")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                raw_name.to_string(),
            ),
        };

        let raw_fields = attrs
            .get("fields")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| Error::SchemaParse("record has no fields array".to_string()))?;
        let mut fields = Vec::with_capacity(raw_fields.len());
        for raw in raw_fields {
            let attrs = raw
                .as_object()
                .ok_or_else(|| Error::SchemaParse("field is not an object".to_string()))?;
            let field_name = attrs
                .get("name")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Error::SchemaParse("field has no name".to_string()))?
                .to_string();
            let schema = AvroSchema::from_schema_json(
                attrs
                    .get("type")
                    .ok_or_else(|| Error::SchemaParse(format!("field {field_name:?} has no type")))?,
            )?;
            let default = attrs
                .get("default")
                .map(|json| Value::from_json(&field_name, json))
                .transpose()
                .map_err(|e| Error::SchemaParse(e.to_string()))?;
            fields.push(AvroField::new(field_name, schema, default));
        }

        Self::new(name, namespace, fields)
    }
}
