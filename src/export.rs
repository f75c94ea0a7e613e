//! Export orchestration.
//!
//! Writes one Object Container File per user table, optionally alongside
//! a JSON dump of the table schema. Tables are exported sequentially and
//! the operation is not atomic across tables: a fault partway through
//! leaves a valid prefix of completed files on disk for inspection.

use crate::avro::{ContainerWriter, Row};
use crate::schema::{TableSchema, translate};
use crate::store::{list_tables, read_rows, read_schema};
use crate::{Error, Result};
use rusqlite::Connection;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Caller-supplied hooks for augmenting schemas and rows during export.
///
/// Both hooks default to the identity. [`adjust_schema`](Enhancer::adjust_schema)
/// runs once per table after the schema read and before translation and
/// may add, remove, or modify fields or the creation statement;
/// [`adjust_row`](Enhancer::adjust_row) runs once per row before encoding.
/// Either hook failing aborts the enclosing export.
pub trait Enhancer {
    /// Adjusts a table schema in place before translation.
    ///
    /// # Errors
    ///
    /// Implementations may fail, aborting the export.
    fn adjust_schema(&self, _schema: &mut TableSchema) -> Result<()> {
        Ok(())
    }

    /// Adjusts a row in place before encoding.
    ///
    /// # Errors
    ///
    /// Implementations may fail, aborting the export.
    fn adjust_row(&self, _row: &mut Row) -> Result<()> {
        Ok(())
    }
}

/// The identity enhancer.
pub struct NoopEnhancer;

impl Enhancer for NoopEnhancer {}

/// Exports one table to an Object Container File.
///
/// Reads the schema, applies the enhancer, translates, then streams the
/// table's rows through the container writer. The file is flushed and
/// fsynced before returning.
///
/// # Errors
///
/// Returns the first schema, encode, store, or I/O failure. A partial
/// file may remain on disk.
pub fn table_to_ocf(
    conn: &Connection,
    table: &str,
    path: &Path,
    enhancer: &dyn Enhancer,
) -> Result<()> {
    let mut schema = read_schema(conn, table)?;
    enhancer.adjust_schema(&mut schema)?;
    let record = translate(&schema)?;

    let file = File::create(path)?;
    let mut writer = ContainerWriter::new(BufWriter::new(file), &record)?;

    let rows = read_rows(conn, table)?;
    let count = rows.len();
    for mut row in rows {
        enhancer.adjust_row(&mut row)?;
        writer.append(&row)?;
    }

    let file = writer
        .finish()?
        .into_inner()
        .map_err(std::io::IntoInnerError::into_error)?;
    file.sync_all()?;

    info!(table, rows = count, path = %path.display(), "wrote container file");
    Ok(())
}

/// Writes a table's schema as a JSON document.
///
/// The dump is the table-shaped schema (name, fields, creation SQL), not
/// the derived Avro record; it is what the import CLI consumes.
///
/// # Errors
///
/// Returns the first schema, store, or I/O failure.
pub fn table_to_json(
    conn: &Connection,
    table: &str,
    path: &Path,
    enhancer: &dyn Enhancer,
) -> Result<()> {
    let mut schema = read_schema(conn, table)?;
    enhancer.adjust_schema(&mut schema)?;

    let mut file = File::create(path)?;
    serde_json::to_writer(&file, &schema)?;
    file.flush()?;
    file.sync_all()?;

    info!(table, path = %path.display(), "wrote schema dump");
    Ok(())
}

/// Exports every user table to `<prefix><table>.avro` under `dir`,
/// optionally with a `<prefix><table>.json` schema dump each.
///
/// Tables are processed sequentially, one fully completed before the
/// next. The operation is not atomic: on failure the files written so
/// far remain on disk.
///
/// Returns the paths of all files written.
///
/// # Errors
///
/// Returns the first per-table failure.
pub fn export_database(
    conn: &Connection,
    dir: &Path,
    prefix: &str,
    include_json: bool,
    enhancer: &dyn Enhancer,
) -> Result<Vec<PathBuf>> {
    let tables = list_tables(conn)?;
    info!(tables = tables.len(), dir = %dir.display(), "exporting database");

    let mut files = Vec::new();
    for table in tables {
        let ocf_path = dir.join(format!("{prefix}{table}.avro"));
        table_to_ocf(conn, &table, &ocf_path, enhancer)?;
        files.push(ocf_path);

        if include_json {
            let json_path = dir.join(format!("{prefix}{table}.json"));
            table_to_json(conn, &table, &json_path, enhancer)?;
            files.push(json_path);
        }
    }
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::avro::{ContainerReader, Value};
    use crate::schema::{Field, StorageType};
    use std::io::BufReader;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE foo (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);
             INSERT INTO foo (name) VALUES ('bar'), ('bat'), ('baz');
             CREATE TABLE meats (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);
             INSERT INTO meats (name) VALUES ('beef'), ('pork'), ('chicken');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_export_database_writes_expected_files() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();

        let files = export_database(&conn, dir.path(), "dump_", true, &NoopEnhancer).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["dump_foo.avro", "dump_foo.json", "dump_meats.avro", "dump_meats.json"]
        );
        for file in &files {
            assert!(file.exists());
        }
    }

    #[test]
    fn test_table_to_ocf_round_trips() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.avro");

        table_to_ocf(&conn, "foo", &path, &NoopEnhancer).unwrap();

        let reader =
            ContainerReader::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(reader.schema().fullname(), "io.avrolite.foo");
        let rows = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("bar".to_string())));
    }

    #[test]
    fn test_table_to_json_dump_is_readable() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.json");

        table_to_json(&conn, "foo", &path, &NoopEnhancer).unwrap();

        let dumped: TableSchema =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(dumped.table, "foo");
        assert_eq!(dumped.field_names(), vec!["id", "name"]);
        assert!(dumped.creation_sql.starts_with("CREATE TABLE"));
    }

    struct Stamper;

    impl Enhancer for Stamper {
        fn adjust_schema(&self, schema: &mut TableSchema) -> Result<()> {
            schema.fields.push(Field::new(
                "source".to_string(),
                StorageType::Text,
                false,
                Some(Value::Text("export".to_string())),
            ));
            Ok(())
        }

        fn adjust_row(&self, row: &mut Row) -> Result<()> {
            row.insert("source".to_string(), Value::Text("export".to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_enhancer_hooks_shape_schema_and_rows() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.avro");

        table_to_ocf(&conn, "foo", &path, &Stamper).unwrap();

        let reader =
            ContainerReader::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        let rows = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.get("source"), Some(&Value::Text("export".to_string())));
        }
    }

    struct Refuser;

    impl Enhancer for Refuser {
        fn adjust_schema(&self, _schema: &mut TableSchema) -> Result<()> {
            Err(Error::enhance("schema"))
        }
    }

    #[test]
    fn test_failing_enhancer_aborts_export() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let err = export_database(&conn, dir.path(), "", false, &Refuser).unwrap_err();
        assert!(matches!(err, Error::Enhance(_)));
    }
}
