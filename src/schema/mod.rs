//! SQLite table schema model and Avro translation.
//!
//! The pipeline runs leaf-first:
//!
//! - [`StorageType`]: the six storage classes a column can declare, plus
//!   default-text parsing.
//! - [`Field`] / [`TableSchema`]: the catalog-shaped intermediate model,
//!   including the default-resolution rule.
//! - [`translate`] / [`map_type`]: the type mapper and the table-to-record
//!   translator.

mod storage;
mod table;
mod translate;

pub use storage::StorageType;
pub use table::{Field, TableSchema};
pub use translate::{RECORD_NAMESPACE, map_type, translate};
