//! Avro Object Container Files.
//!
//! A container file is a self-describing header (magic, metadata map with
//! the schema JSON and codec name, 16-byte sync marker) followed by data
//! blocks. Each block is a row count, a byte length, the encoded rows, and
//! a repeat of the sync marker. Only the `null` codec is supported.
//!
//! The writer buffers rows and emits a block when the buffer crosses a
//! size threshold; callers must [`ContainerWriter::flush`] (and fsync the
//! underlying file) before treating the output as durable.

use crate::avro::binary::{decode_row, encode_row, read_long, write_long};
use crate::avro::schema::{AvroSchema, RecordSchema};
use crate::avro::value::Row;
use crate::{Error, Result};
use std::io::{self, BufRead, Read, Write};

/// File magic: "Obj" followed by the format version byte.
const MAGIC: [u8; 4] = *b"Obj\x01";

/// Emit a block once this many encoded bytes are pending.
const BLOCK_SIZE_THRESHOLD: usize = 16 * 1024;

fn write_long_to(writer: &mut impl Write, value: i64) -> Result<()> {
    let mut buf = Vec::with_capacity(10);
    write_long(&mut buf, value);
    writer.write_all(&buf)?;
    Ok(())
}

fn invalid_data(message: &str) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, message.to_string()))
}

/// Writes rows of a single record schema to an Object Container File.
pub struct ContainerWriter<W: Write> {
    writer: W,
    schema: RecordSchema,
    sync: [u8; 16],
    /// Encoded rows waiting for the next block.
    pending: Vec<u8>,
    pending_rows: i64,
    rows_written: usize,
}

impl<W: Write> ContainerWriter<W> {
    /// Creates a writer and emits the file header immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(mut writer: W, schema: &RecordSchema) -> Result<Self> {
        let sync = *uuid::Uuid::new_v4().as_bytes();
        let schema_json = schema.to_json_string();

        writer.write_all(&MAGIC)?;
        // Metadata map: one block of two entries, then the end marker.
        write_long_to(&mut writer, 2)?;
        write_meta_entry(&mut writer, "avro.schema", schema_json.as_bytes())?;
        write_meta_entry(&mut writer, "avro.codec", b"null")?;
        write_long_to(&mut writer, 0)?;
        writer.write_all(&sync)?;

        Ok(Self {
            writer,
            schema: schema.clone(),
            sync,
            pending: Vec::new(),
            pending_rows: 0,
            rows_written: 0,
        })
    }

    /// The schema this file carries.
    #[must_use]
    pub const fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Encodes and buffers one row, emitting a block when the buffer is
    /// large enough.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] with the row's position in the file on
    /// encode failure, or an I/O error from a block write.
    pub fn append(&mut self, row: &Row) -> Result<()> {
        let mark = self.pending.len();
        if let Err(e) = encode_row(&mut self.pending, &self.schema, row) {
            self.pending.truncate(mark);
            return Err(Error::Encode {
                row: self.rows_written,
                source: Box::new(e),
            });
        }
        self.pending_rows += 1;
        self.rows_written += 1;
        if self.pending.len() >= BLOCK_SIZE_THRESHOLD {
            self.write_block()?;
        }
        Ok(())
    }

    /// Emits any buffered rows as a block and flushes the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the block or flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.write_block()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final block cannot be written.
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }

    fn write_block(&mut self) -> Result<()> {
        if self.pending_rows == 0 {
            return Ok(());
        }
        write_long_to(&mut self.writer, self.pending_rows)?;
        write_long_to(&mut self.writer, i64::try_from(self.pending.len()).unwrap_or(i64::MAX))?;
        self.writer.write_all(&self.pending)?;
        self.writer.write_all(&self.sync)?;
        self.pending.clear();
        self.pending_rows = 0;
        Ok(())
    }
}

fn write_meta_entry(writer: &mut impl Write, key: &str, value: &[u8]) -> Result<()> {
    write_long_to(writer, i64::try_from(key.len()).unwrap_or(i64::MAX))?;
    writer.write_all(key.as_bytes())?;
    write_long_to(writer, i64::try_from(value.len()).unwrap_or(i64::MAX))?;
    writer.write_all(value)?;
    Ok(())
}

/// Reads rows from an Object Container File.
///
/// Iterates rows across blocks; sync markers are verified after every
/// block and a mismatch is reported as a corrupt stream.
#[derive(Debug)]
pub struct ContainerReader<R: BufRead> {
    reader: R,
    schema: RecordSchema,
    sync: [u8; 16],
    block: io::Cursor<Vec<u8>>,
    remaining_in_block: i64,
    position: usize,
    done: bool,
}

impl<R: BufRead> ContainerReader<R> {
    /// Parses the container header and prepares to iterate rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the magic, metadata, schema, or codec are
    /// invalid. Codecs other than `null` are rejected.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(invalid_data("not an avro object container file"));
        }

        let mut schema_json: Option<Vec<u8>> = None;
        let mut codec: Option<Vec<u8>> = None;
        loop {
            let count = read_long(&mut reader)?;
            if count == 0 {
                break;
            }
            // A negative count is followed by the block's byte size, which
            // this reader does not need.
            let count = if count < 0 {
                let _ = read_long(&mut reader)?;
                -count
            } else {
                count
            };
            for _ in 0..count {
                let key = read_sized_bytes(&mut reader)?;
                let value = read_sized_bytes(&mut reader)?;
                match key.as_slice() {
                    b"avro.schema" => schema_json = Some(value),
                    b"avro.codec" => codec = Some(value),
                    _ => {},
                }
            }
        }

        if let Some(codec) = codec
            && codec != b"null"
        {
            return Err(invalid_data(&format!(
                "unsupported codec {:?}",
                String::from_utf8_lossy(&codec)
            )));
        }

        let schema_json = schema_json.ok_or_else(|| invalid_data("header has no avro.schema"))?;
        let schema_text = String::from_utf8(schema_json)
            .map_err(|_| invalid_data("avro.schema is not valid utf-8"))?;
        let AvroSchema::Record(schema) = AvroSchema::parse(&schema_text)? else {
            return Err(Error::SchemaParse("container schema is not a record".to_string()));
        };

        let mut sync = [0u8; 16];
        reader.read_exact(&mut sync)?;

        Ok(Self {
            reader,
            schema,
            sync,
            block: io::Cursor::new(Vec::new()),
            remaining_in_block: 0,
            position: 0,
            done: false,
        })
    }

    /// The record schema embedded in the file header.
    #[must_use]
    pub const fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn next_block(&mut self) -> Result<bool> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(false);
        }
        let count = read_long(&mut self.reader)?;
        let size = read_long(&mut self.reader)?;
        let size = usize::try_from(size).map_err(|_| invalid_data("negative block size"))?;
        let mut payload = vec![0u8; size];
        self.reader.read_exact(&mut payload)?;

        let mut sync = [0u8; 16];
        self.reader.read_exact(&mut sync)?;
        if sync != self.sync {
            return Err(invalid_data("sync marker mismatch, file is corrupt"));
        }

        self.block = io::Cursor::new(payload);
        self.remaining_in_block = count;
        Ok(true)
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        while self.remaining_in_block == 0 {
            if !self.next_block()? {
                return Ok(None);
            }
        }
        let row = decode_row(&mut self.block, &self.schema).map_err(|e| Error::Decode {
            row: self.position,
            source: Box::new(e),
        })?;
        self.remaining_in_block -= 1;
        self.position += 1;
        Ok(Some(row))
    }
}

impl<R: BufRead> Iterator for ContainerReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

fn read_sized_bytes(reader: &mut impl Read) -> Result<Vec<u8>> {
    let len = read_long(reader)?;
    let len = usize::try_from(len).map_err(|_| invalid_data("negative length prefix"))?;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}
