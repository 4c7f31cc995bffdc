//! Row codec for encoding/decoding entity fields to/from bytes.
//!
//! Format:
//! - Field count (4 bytes, little-endian)
//! - For each field:
//!   - Field name length (2 bytes, little-endian)
//!   - Field name (UTF-8 bytes)
//!   - Value tag (1 byte)
//!   - Value data (fixed width for scalars, u32 length prefix for strings and arrays)

use crate::error::Error;
use lms_proto::Value;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT32: u8 = 2;
const TAG_INT64: u8 = 3;
const TAG_FLOAT64: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_TIMESTAMP: u8 = 6;
const TAG_STRING_ARRAY: u8 = 7;

/// Encode a list of field name/value pairs to bytes.
pub fn encode_entity(fields: &[(String, Value)]) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&(fields.len() as u32).to_le_bytes());

    for (name, value) in fields {
        let name_bytes = name.as_bytes();
        let name_len = u16::try_from(name_bytes.len())
            .map_err(|_| Error::InvalidData(format!("field name too long: {}", name)))?;
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name_bytes);
        encode_value(&mut buf, value)?;
    }

    Ok(buf)
}

/// Decode bytes back to field name/value pairs.
pub fn decode_entity(data: &[u8]) -> Result<Vec<(String, Value)>, Error> {
    let mut reader = Reader::new(data);
    let count = reader.u32()? as usize;
    let mut fields = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        let name = reader.name()?.to_string();
        let value = reader.value()?;
        fields.push((name, value));
    }

    Ok(fields)
}

/// Get a single field value by name without materializing the others.
pub fn get_field(data: &[u8], field_name: &str) -> Result<Option<Value>, Error> {
    let mut reader = Reader::new(data);
    let count = reader.u32()?;

    for _ in 0..count {
        if reader.name()? == field_name {
            return reader.value().map(Some);
        }
        reader.skip_value()?;
    }

    Ok(None)
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int32(v) => {
            buf.push(TAG_INT32);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Value::Int64(v) => {
            buf.push(TAG_INT64);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Value::Float64(v) => {
            buf.push(TAG_FLOAT64);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            encode_str(buf, s)?;
        }
        Value::Timestamp(v) => {
            buf.push(TAG_TIMESTAMP);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Value::StringArray(items) => {
            buf.push(TAG_STRING_ARRAY);
            let len = u32::try_from(items.len())
                .map_err(|_| Error::InvalidData("array too long".into()))?;
            buf.extend_from_slice(&len.to_le_bytes());
            for item in items {
                encode_str(buf, item)?;
            }
        }
    }
    Ok(())
}

fn encode_str(buf: &mut Vec<u8>, s: &str) -> Result<(), Error> {
    let len =
        u32::try_from(s.len()).map_err(|_| Error::InvalidData("string too long".into()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Bounds-checked cursor over encoded row bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidData(format!("row truncated at byte {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn name(&mut self) -> Result<&'a str, Error> {
        let len = self.u16()? as usize;
        std::str::from_utf8(self.take(len)?)
            .map_err(|_| Error::InvalidData("invalid UTF-8 in field name".into()))
    }

    fn string(&mut self) -> Result<String, Error> {
        let len = self.u32()? as usize;
        String::from_utf8(self.take(len)?.to_vec())
            .map_err(|_| Error::InvalidData("invalid UTF-8 in string value".into()))
    }

    fn value(&mut self) -> Result<Value, Error> {
        let value = match self.u8()? {
            TAG_NULL => Value::Null,
            TAG_BOOL => Value::Bool(self.u8()? != 0),
            TAG_INT32 => Value::Int32(i32::from_le_bytes(self.array()?)),
            TAG_INT64 => Value::Int64(i64::from_le_bytes(self.array()?)),
            TAG_FLOAT64 => Value::Float64(f64::from_le_bytes(self.array()?)),
            TAG_STRING => Value::String(self.string()?),
            TAG_TIMESTAMP => Value::Timestamp(i64::from_le_bytes(self.array()?)),
            TAG_STRING_ARRAY => {
                let len = self.u32()? as usize;
                let mut items = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    items.push(self.string()?);
                }
                Value::StringArray(items)
            }
            tag => return Err(Error::InvalidData(format!("unknown value tag: {}", tag))),
        };
        Ok(value)
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        match self.u8()? {
            TAG_NULL => {}
            TAG_BOOL => {
                self.take(1)?;
            }
            TAG_INT32 => {
                self.take(4)?;
            }
            TAG_INT64 | TAG_FLOAT64 | TAG_TIMESTAMP => {
                self.take(8)?;
            }
            TAG_STRING => {
                let len = self.u32()? as usize;
                self.take(len)?;
            }
            TAG_STRING_ARRAY => {
                let count = self.u32()?;
                for _ in 0..count {
                    let len = self.u32()? as usize;
                    self.take(len)?;
                }
            }
            tag => return Err(Error::InvalidData(format!("unknown value tag: {}", tag))),
        }
        Ok(())
    }
}
