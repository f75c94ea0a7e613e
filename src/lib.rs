//! # Avrolite
//!
//! Convert SQLite schemas and data to Avro and back.
//!
//! Avrolite reads a table's catalog metadata, translates it into a
//! deterministic Avro record schema, encodes the table's rows into Avro
//! binary (as a raw row stream or an Object Container File), and can load
//! an Avro row stream back into SQLite, recreating or replacing the table.
//!
//! ## Type mapping
//!
//! SQLite storage classes widen to the broadest compatible Avro primitive,
//! trading density for compatibility:
//!
//! | Storage class | Avro type |
//! |---------------|-----------|
//! | `null`        | `null`    |
//! | `integer`     | `long`    |
//! | `real`        | `double`  |
//! | `text`        | `string`  |
//! | `blob`        | `bytes`   |
//! | `boolean`     | `boolean` |
//!
//! Nullable columns become a null-first two-way union `["null", T]`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use avrolite::{export_database, NoopEnhancer};
//!
//! let conn = rusqlite::Connection::open("app.db")?;
//! let files = export_database(&conn, "./out", "dump_", true, &NoopEnhancer)?;
//! println!("wrote {} files", files.len());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod avro;
pub mod export;
pub mod schema;
pub mod store;

// Re-exports for convenience
pub use avro::{
    AvroSchema, AvroType, ContainerReader, ContainerWriter, RecordSchema, Row, RowReader, Value,
    decode_rows, encode_rows, row_to_typed, typed_to_row,
};
pub use export::{Enhancer, NoopEnhancer, export_database, table_to_json, table_to_ocf};
pub use schema::{Field, StorageType, TableSchema, map_type, translate};
pub use store::{list_tables, load_container, load_rows, read_rows, read_schema, table_exists};

/// Error type for avrolite operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `UnknownType` | Catalog declares a storage class outside the six-variant set |
/// | `FieldConversion` | Type mapping fails for a column during translation |
/// | `RecordConstruction` | Duplicate or invalid field names at record-build time |
/// | `DefaultParse` | Catalog default text does not parse as the declared storage class |
/// | `MissingField` | A row map lacks a value for a schema field |
/// | `Coercion` | A row value cannot be coerced to its field's Avro type |
/// | `Encode` | Row-level encode failure, carries the row position |
/// | `Decode` | Malformed or truncated byte stream |
/// | `SchemaParse` | Avro schema JSON is malformed or unsupported |
/// | `Store` | Any SQLite catalog/row/DDL/DML call fails |
/// | `Enhance` | A caller-supplied enhancer hook rejects a schema or row |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The catalog declared a storage class outside the supported set.
    #[error("unknown sqlite storage type: {0:?}")]
    UnknownType(String),

    /// Translating a single column to an Avro field failed.
    #[error("failed to convert field '{field}'")]
    FieldConversion {
        /// Column name that failed to translate.
        field: String,
        /// The underlying type-mapping error.
        #[source]
        source: Box<Error>,
    },

    /// Building the record schema from the translated fields failed.
    #[error("failed to build record schema: {0}")]
    RecordConstruction(String),

    /// A catalog default value did not parse as its declared storage class.
    ///
    /// This is a hard failure: an unparsable default in the catalog means
    /// the schema cannot be trusted, so no zero-value fallback applies.
    #[error("invalid default {text:?} for {storage} column '{column}': {cause}")]
    DefaultParse {
        /// Column carrying the default.
        column: String,
        /// Declared storage class, lower-cased.
        storage: String,
        /// The raw default text from the catalog.
        text: String,
        /// Parse failure detail.
        cause: String,
    },

    /// A row map had no value for a schema field.
    #[error("row has no value for field '{0}'")]
    MissingField(String),

    /// A row value could not be coerced to its field's Avro type.
    #[error("value for field '{field}' does not fit {expected}: got {actual}")]
    Coercion {
        /// Field being encoded.
        field: String,
        /// Avro type the schema requires.
        expected: String,
        /// Kind of value the row supplied.
        actual: String,
    },

    /// Encoding a row against the schema failed.
    ///
    /// Output written before the failing row is not rolled back; the
    /// caller must discard the buffer.
    #[error("failed to encode row {row}")]
    Encode {
        /// Zero-based position of the offending row.
        row: usize,
        /// The underlying cause.
        #[source]
        source: Box<Error>,
    },

    /// Decoding the byte stream failed mid-row.
    ///
    /// Rows decoded before the fault are valid and are handed back to the
    /// caller alongside this error.
    #[error("failed to decode row {row}")]
    Decode {
        /// Zero-based position of the row that failed to decode.
        row: usize,
        /// The underlying cause.
        #[source]
        source: Box<Error>,
    },

    /// An Avro schema JSON document is malformed or uses unsupported features.
    #[error("invalid avro schema: {0}")]
    SchemaParse(String),

    /// A SQLite operation failed.
    ///
    /// Store errors are never retried; they carry the operation and table
    /// for diagnosis and propagate verbatim otherwise.
    #[error("store operation '{operation}' on table '{table}' failed: {cause}")]
    Store {
        /// The operation that failed (e.g. `list_tables`, `insert_row`).
        operation: String,
        /// Table the operation targeted, or `*` for database-wide calls.
        table: String,
        /// The underlying SQLite error text.
        cause: String,
    },

    /// A caller-supplied enhancer hook failed.
    #[error("enhancer rejected {0}")]
    Enhance(String),

    /// The operation is a declared contract without an implementation.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// An I/O error occurred while reading or writing a stream.
    #[error("i/o error")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be serialized or deserialized.
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Convenience constructor for enhancer implementations.
    #[must_use]
    pub fn enhance(what: impl Into<String>) -> Self {
        Self::Enhance(what.into())
    }

    /// Wraps a `rusqlite` failure with operation and table context.
    pub(crate) fn store(
        operation: impl Into<String>,
        table: impl Into<String>,
        err: &rusqlite::Error,
    ) -> Self {
        Self::Store {
            operation: operation.into(),
            table: table.into(),
            cause: err.to_string(),
        }
    }
}

/// Result type alias for avrolite operations.
pub type Result<T> = std::result::Result<T, Error>;
