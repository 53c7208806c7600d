//! Tagged scalar values and their binary codec
//!
//! Every stored cell is a `Value`: a tagged union of the five scalar kinds
//! the engine supports. The on-disk form is `[1-byte tag][payload]` with all
//! multi-byte integers little-endian. The tag values are part of the file
//! format and must not change.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::catalog::DataType;
use crate::error::{Error, Result};

/// Serialization tags, fixed for file-format stability.
const TAG_INT: u8 = 0;
const TAG_TEXT: u8 = 1;
const TAG_BOOLEAN: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_DATE: u8 = 4;

/// A single scalar value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// UTF-8 text
    Text(String),
    /// Boolean
    Boolean(bool),
    /// 64-bit IEEE-754 float
    Float(f64),
    /// Date as seconds since the unix epoch
    Date(i64),
}

impl Value {
    /// The data type this value belongs to
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Text(_) => DataType::Text,
            Value::Boolean(_) => DataType::Boolean,
            Value::Float(_) => DataType::Float,
            Value::Date(_) => DataType::Date,
        }
    }

    /// Parse a `YYYY-MM-DD` string into a date value (midnight UTC).
    pub fn date_from_str(s: &str) -> Result<Value> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| Error::InvalidDate(s.to_string()))?;
        let ts = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::InvalidDate(s.to_string()))?
            .and_utc()
            .timestamp();
        Ok(Value::Date(ts))
    }

    /// Serialize this value to its binary form.
    ///
    /// The float payload is the raw IEEE-754 bit pattern; text is a u32
    /// length prefix followed by the UTF-8 bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Value::Int(v) => {
                buf.push(TAG_INT);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Text(s) => {
                buf.push(TAG_TEXT);
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            Value::Boolean(b) => {
                buf.push(TAG_BOOLEAN);
                buf.push(if *b { 1 } else { 0 });
            }
            Value::Float(f) => {
                buf.push(TAG_FLOAT);
                buf.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::Date(ts) => {
                buf.push(TAG_DATE);
                buf.extend_from_slice(&ts.to_le_bytes());
            }
        }
        buf
    }

    /// Deserialize a value from the front of `data`.
    ///
    /// Returns the value together with the number of bytes consumed, so a
    /// caller can decode a sequence of values back to back.
    pub fn deserialize(data: &[u8]) -> Result<(Value, usize)> {
        let tag = *data.first().ok_or(Error::ShortRead)?;
        let rest = &data[1..];

        match tag {
            TAG_INT => {
                let bytes = read_fixed::<8>(rest)?;
                Ok((Value::Int(i64::from_le_bytes(bytes)), 9))
            }
            TAG_TEXT => {
                let len_bytes = read_fixed::<4>(rest)?;
                let len = u32::from_le_bytes(len_bytes) as usize;
                let body = rest.get(4..4 + len).ok_or(Error::ShortRead)?;
                let text = String::from_utf8(body.to_vec()).map_err(|_| Error::InvalidUtf8)?;
                Ok((Value::Text(text), 1 + 4 + len))
            }
            TAG_BOOLEAN => {
                let byte = *rest.first().ok_or(Error::ShortRead)?;
                Ok((Value::Boolean(byte == 1), 2))
            }
            TAG_FLOAT => {
                let bytes = read_fixed::<8>(rest)?;
                Ok((Value::Float(f64::from_bits(u64::from_le_bytes(bytes))), 9))
            }
            TAG_DATE => {
                let bytes = read_fixed::<8>(rest)?;
                Ok((Value::Date(i64::from_le_bytes(bytes)), 9))
            }
            other => Err(Error::TypeMismatch {
                expected: "a known value tag".to_string(),
                found: format!("tag {}", other),
            }),
        }
    }

    /// Compare two values of the same kind.
    ///
    /// Cross-kind comparison is a type error rather than an arbitrary
    /// ordering; coercion happens at ingest, never at comparison time.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(a.total_cmp(b)),
            (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
            _ => Err(Error::TypeMismatch {
                expected: self.data_type().to_string(),
                found: other.data_type().to_string(),
            }),
        }
    }

    /// Total ordering used inside index trees.
    ///
    /// All entries of one index share a kind (enforced on insert), so the
    /// cross-kind branch only exists to keep the ordering total; it sorts by
    /// tag and is never reached through the public index API.
    pub(crate) fn cmp_total(&self, other: &Value) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|_| self.tag().cmp(&other.tag()))
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Int(_) => TAG_INT,
            Value::Text(_) => TAG_TEXT,
            Value::Boolean(_) => TAG_BOOLEAN,
            Value::Float(_) => TAG_FLOAT,
            Value::Date(_) => TAG_DATE,
        }
    }
}

fn read_fixed<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    let slice = data.get(..N).ok_or(Error::ShortRead)?;
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(slice);
    Ok(bytes)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Float(v) => write!(f, "{}", v),
            Value::Date(ts) => match DateTime::<Utc>::from_timestamp(*ts, 0) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d")),
                None => write!(f, "INVALID_DATE({})", ts),
            },
        }
    }
}
