//! SQLite row reads and the import path.

use crate::avro::{Row, RowReader, Value};
use crate::schema::TableSchema;
use crate::store::quote_ident;
use crate::{Error, Result, translate};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use std::io::BufRead;

/// Reads every row of a table, in the store's natural order.
///
/// Each row is a column-name→value map using the store's dynamic typing.
///
/// # Errors
///
/// Returns [`Error::Store`] if the query or a row scan fails.
pub fn read_rows(conn: &Connection, table: &str) -> Result<Vec<Row>> {
    let sql = format!("SELECT * FROM {}", quote_ident(table));
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::store("read_rows", table, &e))?;
    let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();

    let mut rows = Vec::new();
    let mut results = stmt
        .query([])
        .map_err(|e| Error::store("read_rows", table, &e))?;
    while let Some(result) = results
        .next()
        .map_err(|e| Error::store("read_rows", table, &e))?
    {
        let mut row = Row::new();
        for (index, column) in columns.iter().enumerate() {
            let value = match result
                .get_ref(index)
                .map_err(|e| Error::store("read_rows", table, &e))?
            {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(i) => Value::Long(i),
                ValueRef::Real(f) => Value::Double(f),
                ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
                ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
            };
            row.insert(column.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Reports whether a table of the given name exists.
///
/// # Errors
///
/// Returns [`Error::Store`] if the catalog query fails.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .map_err(|e| Error::store("table_exists", table, &e))?;
    stmt.exists([table])
        .map_err(|e| Error::store("table_exists", table, &e))
}

/// Loads an Avro row stream into the store, replacing the table contents.
///
/// Import is destructive by design: a missing table is created from the
/// schema's verbatim creation statement, an existing one has all rows
/// deleted first, and the decoded rows are inserted one at a time. Each
/// step is its own commit point with no cross-step transaction.
///
/// Returns the number of rows inserted so far on every exit path; on
/// failure the count reflects the rows that made it in before the fault.
pub fn load_rows(
    conn: &Connection,
    schema: &TableSchema,
    reader: impl BufRead,
) -> (usize, Result<()>) {
    let mut inserted = 0usize;
    let result = load_rows_inner(conn, schema, reader, &mut inserted);
    (inserted, result)
}

/// Loads rows from an Object Container File into the store.
///
/// Same replace-not-append semantics as [`load_rows`]; the container's
/// blocks are unwrapped and its rows decoded against the embedded
/// schema, while the insert column list comes from `schema`.
pub fn load_container(
    conn: &Connection,
    schema: &TableSchema,
    reader: impl BufRead,
) -> (usize, Result<()>) {
    let mut inserted = 0usize;
    let result = load_container_inner(conn, schema, reader, &mut inserted);
    (inserted, result)
}

fn load_rows_inner(
    conn: &Connection,
    schema: &TableSchema,
    reader: impl BufRead,
    inserted: &mut usize,
) -> Result<()> {
    let record = translate(schema)?;
    prepare_destination(conn, schema)?;
    let rows = RowReader::new(&record, reader);
    insert_all(conn, schema.table.as_str(), &record, rows, inserted)
}

fn load_container_inner(
    conn: &Connection,
    schema: &TableSchema,
    reader: impl BufRead,
    inserted: &mut usize,
) -> Result<()> {
    let record = translate(schema)?;
    prepare_destination(conn, schema)?;
    let rows = crate::avro::ContainerReader::new(reader)?;
    insert_all(conn, schema.table.as_str(), &record, rows, inserted)
}

/// Creates the destination table from the verbatim creation statement,
/// or deletes all existing rows if it already exists.
fn prepare_destination(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let table = schema.table.as_str();
    if table_exists(conn, table)? {
        tracing::debug!(table, "table exists, deleting existing rows");
        conn.execute(&format!("DELETE FROM {}", quote_ident(table)), [])
            .map_err(|e| Error::store("delete_rows", table, &e))?;
    } else {
        if schema.creation_sql.trim().is_empty() {
            return Err(Error::Store {
                operation: "create_table".to_string(),
                table: table.to_string(),
                cause: "schema carries no creation statement".to_string(),
            });
        }
        tracing::debug!(table, "creating table");
        conn.execute_batch(&schema.creation_sql)
            .map_err(|e| Error::store("create_table", table, &e))?;
    }
    Ok(())
}

fn insert_all(
    conn: &Connection,
    table: &str,
    record: &crate::avro::RecordSchema,
    rows: impl Iterator<Item = Result<Row>>,
    inserted: &mut usize,
) -> Result<()> {
    let columns = record
        .fields
        .iter()
        .map(|field| quote_ident(&field.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=record.fields.len())
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_ident(table)
    );
    let mut stmt = conn
        .prepare(&insert_sql)
        .map_err(|e| Error::store("prepare_insert", table, &e))?;

    for item in rows {
        let row = item?;
        let params = record
            .fields
            .iter()
            .map(|field| {
                row.get(&field.name)
                    .cloned()
                    .map(rusqlite::types::Value::from)
                    .ok_or_else(|| Error::MissingField(field.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        stmt.execute(rusqlite::params_from_iter(params))
            .map_err(|e| Error::store("insert_row", table, &e))?;
        *inserted += 1;
    }

    tracing::debug!(table, rows = *inserted, "import complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::avro::encode_rows;
    use crate::schema::{Field, StorageType};

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE foo (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);
             INSERT INTO foo (name) VALUES ('bar'), ('bat'), ('baz');",
        )
        .unwrap();
        conn
    }

    fn foo_schema() -> TableSchema {
        TableSchema::new(
            "foo".to_string(),
            vec![
                Field::new("id".to_string(), StorageType::Integer, true, None),
                Field::new("name".to_string(), StorageType::Text, true, None),
            ],
            "CREATE TABLE foo (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)".to_string(),
        )
    }

    fn encode_foo_rows(pairs: &[(i64, &str)]) -> Vec<u8> {
        let record = translate(&foo_schema()).unwrap();
        let rows: Vec<Row> = pairs
            .iter()
            .map(|(id, name)| {
                Row::from([
                    ("id".to_string(), Value::Long(*id)),
                    ("name".to_string(), Value::Text((*name).to_string())),
                ])
            })
            .collect();
        encode_rows(&record, &rows).unwrap()
    }

    #[test]
    fn test_read_rows() {
        let conn = test_db();
        let rows = read_rows(&conn, "foo").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("id"), Some(&Value::Long(1)));
        assert_eq!(rows[0].get("name"), Some(&Value::Text("bar".to_string())));
        assert_eq!(rows[2].get("name"), Some(&Value::Text("baz".to_string())));
    }

    #[test]
    fn test_table_exists() {
        let conn = test_db();
        assert!(table_exists(&conn, "foo").unwrap());
        assert!(!table_exists(&conn, "nope").unwrap());
    }

    #[test]
    fn test_load_rows_replaces_not_appends() {
        let conn = test_db();
        let stream = encode_foo_rows(&[(10, "ham"), (11, "spam")]);

        let (count, result) = load_rows(&conn, &foo_schema(), stream.as_slice());
        result.unwrap();
        assert_eq!(count, 2);

        // 3 existing rows replaced by exactly the 2 streamed rows.
        let rows = read_rows(&conn, "foo").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("ham".to_string())));
        assert_eq!(rows[1].get("name"), Some(&Value::Text("spam".to_string())));
    }

    #[test]
    fn test_load_rows_creates_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        let stream = encode_foo_rows(&[(1, "bar")]);

        let (count, result) = load_rows(&conn, &foo_schema(), stream.as_slice());
        result.unwrap();
        assert_eq!(count, 1);
        assert!(table_exists(&conn, "foo").unwrap());
    }

    #[test]
    fn test_load_rows_empty_stream_truncates() {
        let conn = test_db();
        let (count, result) = load_rows(&conn, &foo_schema(), &[][..]);
        result.unwrap();
        assert_eq!(count, 0);
        assert!(read_rows(&conn, "foo").unwrap().is_empty());
    }

    #[test]
    fn test_load_rows_reports_partial_count_on_corrupt_stream() {
        let conn = test_db();
        let mut stream = encode_foo_rows(&[(10, "ham"), (11, "spam")]);
        // Truncate into the middle of the second row.
        stream.truncate(stream.len() - 2);

        let (count, result) = load_rows(&conn, &foo_schema(), stream.as_slice());
        assert_eq!(count, 1);
        assert!(matches!(result.unwrap_err(), Error::Decode { row: 1, .. }));
    }

    #[test]
    fn test_load_rows_without_creation_sql_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let mut schema = foo_schema();
        schema.creation_sql = String::new();
        let (count, result) = load_rows(&conn, &schema, &[][..]);
        assert_eq!(count, 0);
        assert!(matches!(result.unwrap_err(), Error::Store { operation, .. } if operation == "create_table"));
    }
}
