//! Avro binary row codec.
//!
//! Encodes and decodes rows against a translated record schema using the
//! Avro binary encoding: longs are zigzag varints, doubles are 8 bytes
//! little-endian, strings and bytes are length-prefixed, and union values
//! carry their branch index as a long prefix.
//!
//! Encoding walks the schema's fields in order and looks each value up by
//! name, so the caller's row-map iteration order never matters. Decoding
//! is lazy: [`RowReader`] yields one row at a time and stops cleanly at a
//! row boundary.

use crate::avro::schema::{AvroSchema, AvroType, RecordSchema};
use crate::avro::value::{Row, Value};
use crate::{Error, Result};
use std::io::{self, BufRead, Read};

/// Maps a signed long onto the unsigned zigzag space.
const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Appends a zigzag varint long to the buffer.
pub(crate) fn write_long(buf: &mut Vec<u8>, value: i64) {
    let mut rest = zigzag_encode(value);
    loop {
        let byte = (rest & 0x7F) as u8;
        rest >>= 7;
        if rest == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Reads a zigzag varint long.
///
/// A varint longer than 10 bytes cannot encode a 64-bit value and is
/// rejected as corrupt.
pub(crate) fn read_long(reader: &mut impl Read) -> Result<i64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        if shift >= 64 {
            return Err(invalid_data("varint exceeds 64 bits"));
        }
        value |= u64::from(byte[0] & 0x7F) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(zigzag_decode(value));
        }
        shift += 7;
    }
}

fn invalid_data(message: &str) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, message.to_string()))
}

/// Encodes one value against a field schema.
fn encode_value(buf: &mut Vec<u8>, field: &str, schema: &AvroSchema, value: &Value) -> Result<()> {
    match schema {
        AvroSchema::Primitive(primitive) => encode_primitive(buf, field, *primitive, value),
        AvroSchema::Union(branches) => {
            if matches!(value, Value::Null) {
                let index = branch_index(branches, field, AvroType::Null, value)?;
                write_long(buf, index);
                Ok(())
            } else {
                // Encode against the first branch the value fits. For the
                // null-first two-way unions the translator produces this
                // is always branch 1.
                let (index, branch) = branches
                    .iter()
                    .enumerate()
                    .find(|(_, branch)| !matches!(branch, AvroSchema::Primitive(AvroType::Null)))
                    .ok_or_else(|| coercion(field, "union with a non-null branch", value))?;
                write_long(buf, i64::try_from(index).unwrap_or(i64::MAX));
                encode_value(buf, field, branch, value)
            }
        },
        AvroSchema::Record(_) => Err(Error::SchemaParse(format!(
            "field '{field}': nested records are not supported"
        ))),
    }
}

fn branch_index(
    branches: &[AvroSchema],
    field: &str,
    wanted: AvroType,
    value: &Value,
) -> Result<i64> {
    branches
        .iter()
        .position(|branch| matches!(branch, AvroSchema::Primitive(p) if *p == wanted))
        .map(|index| i64::try_from(index).unwrap_or(i64::MAX))
        .ok_or_else(|| coercion(field, &format!("union containing {wanted}"), value))
}

fn coercion(field: &str, expected: &str, value: &Value) -> Error {
    Error::Coercion {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: value.kind().to_string(),
    }
}

fn encode_primitive(
    buf: &mut Vec<u8>,
    field: &str,
    primitive: AvroType,
    value: &Value,
) -> Result<()> {
    match (primitive, value) {
        (AvroType::Null, Value::Null) => Ok(()),
        (AvroType::Long, Value::Long(i)) => {
            write_long(buf, *i);
            Ok(())
        },
        (AvroType::Double, Value::Double(f)) => {
            buf.extend_from_slice(&f.to_le_bytes());
            Ok(())
        },
        // SQLite stores integral reals as integers; widen on the way out.
        (AvroType::Double, Value::Long(i)) => {
            #[allow(clippy::cast_precision_loss)]
            buf.extend_from_slice(&(*i as f64).to_le_bytes());
            Ok(())
        },
        (AvroType::String, Value::Text(s)) => {
            write_long(buf, i64::try_from(s.len()).unwrap_or(i64::MAX));
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        },
        (AvroType::Bytes, Value::Bytes(b)) => {
            write_long(buf, i64::try_from(b.len()).unwrap_or(i64::MAX));
            buf.extend_from_slice(b);
            Ok(())
        },
        (AvroType::Boolean, Value::Boolean(b)) => {
            buf.push(u8::from(*b));
            Ok(())
        },
        // Boolean columns read back from SQLite as integers.
        (AvroType::Boolean, Value::Long(i)) => {
            buf.push(u8::from(*i != 0));
            Ok(())
        },
        (expected, value) => Err(coercion(field, expected.as_str(), value)),
    }
}

fn decode_value(reader: &mut impl Read, field: &str, schema: &AvroSchema) -> Result<Value> {
    match schema {
        AvroSchema::Primitive(primitive) => decode_primitive(reader, *primitive),
        AvroSchema::Union(branches) => {
            let index = read_long(reader)?;
            let branch = usize::try_from(index)
                .ok()
                .and_then(|i| branches.get(i))
                .ok_or_else(|| {
                    invalid_data(&format!("union index {index} out of range for field '{field}'"))
                })?;
            decode_value(reader, field, branch)
        },
        AvroSchema::Record(_) => Err(Error::SchemaParse(format!(
            "field '{field}': nested records are not supported"
        ))),
    }
}

fn decode_primitive(reader: &mut impl Read, primitive: AvroType) -> Result<Value> {
    match primitive {
        AvroType::Null => Ok(Value::Null),
        AvroType::Long => Ok(Value::Long(read_long(reader)?)),
        AvroType::Double => {
            let mut bytes = [0u8; 8];
            reader.read_exact(&mut bytes)?;
            Ok(Value::Double(f64::from_le_bytes(bytes)))
        },
        AvroType::String => {
            let bytes = read_sized(reader)?;
            let text = String::from_utf8(bytes)
                .map_err(|_| invalid_data("string payload is not valid utf-8"))?;
            Ok(Value::Text(text))
        },
        AvroType::Bytes => Ok(Value::Bytes(read_sized(reader)?)),
        AvroType::Boolean => {
            let mut byte = [0u8; 1];
            reader.read_exact(&mut byte)?;
            match byte[0] {
                0 => Ok(Value::Boolean(false)),
                1 => Ok(Value::Boolean(true)),
                other => Err(invalid_data(&format!("invalid boolean byte {other:#04x}"))),
            }
        },
    }
}

fn read_sized(reader: &mut impl Read) -> Result<Vec<u8>> {
    let len = read_long(reader)?;
    let len = usize::try_from(len).map_err(|_| invalid_data("negative length prefix"))?;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Encodes one row against the record schema, appending to `buf`.
///
/// # Errors
///
/// Returns [`Error::MissingField`] when the row lacks a schema field and
/// [`Error::Coercion`] when a value does not fit its field's type.
pub fn encode_row(buf: &mut Vec<u8>, schema: &RecordSchema, row: &Row) -> Result<()> {
    for field in &schema.fields {
        let value = row
            .get(&field.name)
            .ok_or_else(|| Error::MissingField(field.name.clone()))?;
        encode_value(buf, &field.name, &field.schema, value)?;
    }
    Ok(())
}

/// Encodes a sequence of rows, in the order supplied.
///
/// Fails on the first row that cannot be encoded; output already encoded
/// is not rolled back, so the caller must discard the buffer on error.
///
/// # Errors
///
/// Returns [`Error::Encode`] carrying the offending row's position.
pub fn encode_rows(schema: &RecordSchema, rows: &[Row]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for (position, row) in rows.iter().enumerate() {
        encode_row(&mut buf, schema, row).map_err(|e| Error::Encode {
            row: position,
            source: Box::new(e),
        })?;
    }
    Ok(buf)
}

/// Decodes one row from the reader.
///
/// # Errors
///
/// Returns an error on any read or parse fault, including end-of-stream
/// mid-row.
pub fn decode_row(reader: &mut impl Read, schema: &RecordSchema) -> Result<Row> {
    let mut row = Row::new();
    for field in &schema.fields {
        let value = decode_value(reader, &field.name, &field.schema)?;
        row.insert(field.name.clone(), value);
    }
    Ok(row)
}

/// Lazy row decoder over a byte stream.
///
/// Yields `Ok(row)` per decoded row and stops cleanly when the stream ends
/// at a row boundary. A fault mid-row yields one `Err` and ends iteration.
pub struct RowReader<'s, R: BufRead> {
    schema: &'s RecordSchema,
    reader: R,
    position: usize,
    done: bool,
}

impl<'s, R: BufRead> RowReader<'s, R> {
    /// Creates a reader decoding rows of `schema` from `reader`.
    pub const fn new(schema: &'s RecordSchema, reader: R) -> Self {
        Self {
            schema,
            reader,
            position: 0,
            done: false,
        }
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        // End-of-stream at a row boundary is a clean stop, not an error.
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let row = decode_row(&mut self.reader, self.schema).map_err(|e| Error::Decode {
            row: self.position,
            source: Box::new(e),
        })?;
        self.position += 1;
        Ok(Some(row))
    }
}

impl<R: BufRead> Iterator for RowReader<'_, R> {
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

/// Decodes every row in the stream.
///
/// The already-decoded prefix is always returned; a fault mid-stream is
/// reported alongside it rather than discarding the partial result.
pub fn decode_rows(schema: &RecordSchema, reader: impl BufRead) -> (Vec<Row>, Option<Error>) {
    let mut rows = Vec::new();
    for item in RowReader::new(schema, reader) {
        match item {
            Ok(row) => rows.push(row),
            Err(e) => return (rows, Some(e)),
        }
    }
    (rows, None)
}
