//! Order-preserving value encoding for index keys.
//!
//! Every encoded value is self-delimiting, so composite keys can be built by
//! concatenation and compared bytewise. Int32 and Int64 share one encoding so
//! a foreign key matches its parent id whatever width it was written with.

use crate::storage::key::SEPARATOR;
use lms_proto::Value;

const NULL: u8 = 0x00;
const BOOL: u8 = 0x01;
const INT: u8 = 0x02;
const FLOAT: u8 = 0x03;
const STRING: u8 = 0x04;
const TIMESTAMP: u8 = 0x05;
const STRING_ARRAY: u8 = 0x06;

/// Start an index key: `kind 0x00 name 0x00`.
pub(crate) fn key_prefix(kind: &[u8], name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(kind.len() + name.len() + 2 + 16);
    key.extend_from_slice(kind);
    key.push(SEPARATOR);
    key.extend_from_slice(name.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Append one value in order-preserving form.
pub(crate) fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(NULL),
        Value::Bool(b) => {
            buf.push(BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int32(i) => encode_int(buf, INT, i64::from(*i)),
        Value::Int64(i) => encode_int(buf, INT, *i),
        Value::Float64(f) => {
            buf.push(FLOAT);
            let bits = f.to_bits();
            let ordered = if bits >> 63 == 1 { !bits } else { bits ^ (1 << 63) };
            buf.extend_from_slice(&ordered.to_be_bytes());
        }
        Value::String(s) => {
            buf.push(STRING);
            encode_str(buf, s);
        }
        Value::Timestamp(t) => encode_int(buf, TIMESTAMP, *t),
        Value::StringArray(items) => {
            buf.push(STRING_ARRAY);
            for item in items {
                buf.push(0x01);
                encode_str(buf, item);
            }
            buf.push(0x00);
        }
    }
}

fn encode_int(buf: &mut Vec<u8>, tag: u8, value: i64) {
    buf.push(tag);
    buf.extend_from_slice(&((value as u64) ^ (1 << 63)).to_be_bytes());
}

/// Escape 0x00 as 0x00 0xFF and terminate with 0x00 0x01.
fn encode_str(buf: &mut Vec<u8>, s: &str) {
    for byte in s.bytes() {
        buf.push(byte);
        if byte == 0x00 {
            buf.push(0xFF);
        }
    }
    buf.push(0x00);
    buf.push(0x01);
}

/// Encode values into a key that sorts the way the values do.
///
/// Used to order listings by arbitrary fields.
pub fn encode_sort_key<'v>(values: impl IntoIterator<Item = &'v Value>) -> Vec<u8> {
    let mut buf = Vec::new();
    for value in values {
        encode_value(&mut buf, value);
    }
    buf
}
