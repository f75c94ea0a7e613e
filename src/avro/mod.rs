//! Avro schema model, binary row codec, and container files.
//!
//! - [`schema`](self): the schema subset this crate produces (primitives,
//!   null-first unions, flat records) with canonical-form fingerprints.
//! - [`Value`] / [`Row`]: dynamically typed values at the storage/wire
//!   boundary, plus a serde bridge for typed callers.
//! - [`encode_rows`] / [`RowReader`]: the raw binary row codec.
//! - [`ContainerWriter`] / [`ContainerReader`]: Object Container Files.

mod binary;
mod ocf;
mod schema;
mod value;

pub use binary::{RowReader, decode_row, decode_rows, encode_row, encode_rows};
pub use ocf::{ContainerReader, ContainerWriter};
pub use schema::{AvroField, AvroSchema, AvroType, RecordSchema};
pub use value::{Row, Value, row_to_typed, typed_to_row};
