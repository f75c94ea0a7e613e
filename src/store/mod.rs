//! SQLite store access.
//!
//! The catalog side ([`list_tables`], [`read_schema`]) reads table
//! metadata in column declaration order; the row side ([`read_rows`],
//! [`table_exists`], [`load_rows`]) moves data. Every call is synchronous
//! and blocking, runs on the caller's connection, and is never retried;
//! failures are wrapped with the operation and table for diagnosis.

mod catalog;
mod rows;

pub use catalog::{list_tables, read_schema};
pub use rows::{load_container, load_rows, read_rows, table_exists};

/// Quotes an identifier for interpolation into SQL text.
///
/// Table names come from the catalog, not from a trusted allow-list, so
/// they are always double-quoted with embedded quotes doubled.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
