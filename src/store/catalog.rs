//! SQLite catalog reads.

use crate::avro::Value;
use crate::schema::{Field, StorageType, TableSchema};
use crate::{Error, Result};
use rusqlite::Connection;

/// Internal bookkeeping tables excluded from [`list_tables`].
const SPECIAL_TABLES: &[&str] = &["sqlite_sequence"];

/// Lists user-defined tables, excluding SQLite's bookkeeping tables.
///
/// # Errors
///
/// Returns [`Error::Store`] if the catalog query fails.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
        .map_err(|e| Error::store("list_tables", "*", &e))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::store("list_tables", "*", &e))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .map_err(|e| Error::store("list_tables", "*", &e))?;
    Ok(names
        .into_iter()
        .filter(|name| !SPECIAL_TABLES.contains(&name.as_str()))
        .collect())
}

/// Reads a table's schema from the catalog.
///
/// Columns come back in declaration order via `pragma_table_info`; the
/// verbatim `CREATE TABLE` statement is read from `sqlite_master`.
/// Declared defaults of non-nullable columns are parsed into native
/// values here; nullable columns never parse their default, since
/// nullability suppresses defaulting before the parse step would run.
///
/// # Errors
///
/// - [`Error::Store`] if a catalog query fails;
/// - [`Error::FieldConversion`] (wrapping [`Error::UnknownType`]) when a
///   column declares a type outside the six storage classes;
/// - [`Error::DefaultParse`] when a non-nullable column's default text
///   does not parse as its storage class — a hard failure, not a
///   fallback.
pub fn read_schema(conn: &Connection, table: &str) -> Result<TableSchema> {
    let creation_sql = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, Option<String>>(0),
        )
        .map_err(|e| Error::store("read_creation_sql", table, &e))?
        .unwrap_or_default();

    let mut stmt = conn
        .prepare(
            "SELECT \"name\", lower(\"type\"), \"notnull\", \"dflt_value\" \
             FROM pragma_table_info(?1)",
        )
        .map_err(|e| Error::store("read_schema", table, &e))?;
    let columns = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .map_err(|e| Error::store("read_schema", table, &e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::store("read_schema", table, &e))?;

    let mut fields = Vec::with_capacity(columns.len());
    for (name, declared, notnull, raw_default) in columns {
        let storage = StorageType::from_catalog(&declared).map_err(|e| Error::FieldConversion {
            field: name.clone(),
            source: Box::new(e),
        })?;
        let nullable = notnull == 0;
        // Nullable columns resolve to "no default" regardless of any
        // declared default, so their default text is never parsed.
        let default = if nullable {
            None
        } else {
            match raw_default {
                Some(text) => parse_default_literal(&name, storage, &text)?,
                None => None,
            }
        };
        fields.push(Field::new(name, storage, nullable, default));
    }

    Ok(TableSchema::new(table.to_string(), fields, creation_sql))
}

/// Parses a SQL default literal as reported by `pragma_table_info`.
///
/// The pragma reports defaults as SQL source text: strings keep their
/// single quotes (`'meatballs'`), blobs appear as hex literals
/// (`X'01FF'`), and `NULL` means no usable default. The literal syntax is
/// peeled off here so that [`StorageType::parse_default`] stays the
/// identity on text, as the translation rules require.
fn parse_default_literal(
    column: &str,
    storage: StorageType,
    raw: &str,
) -> Result<Option<Value>> {
    let text = raw.trim();
    if text.eq_ignore_ascii_case("null") {
        return Ok(None);
    }

    if let Some(body) = text
        .strip_prefix("x'")
        .or_else(|| text.strip_prefix("X'"))
        .and_then(|rest| rest.strip_suffix('\''))
    {
        let bytes = hex::decode(body).map_err(|e| Error::DefaultParse {
            column: column.to_string(),
            storage: storage.as_str().to_string(),
            text: raw.to_string(),
            cause: e.to_string(),
        })?;
        return Ok(Some(Value::Bytes(bytes)));
    }

    let unquoted = if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        text[1..text.len() - 1].replace("''", "'")
    } else {
        text.to_string()
    };
    storage.parse_default(column, &unquoted).map(Some)
}
