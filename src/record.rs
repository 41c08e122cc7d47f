//! Record codec.
//!
//! A record is one input line of the form `<decimal-key>.<payload>`. In memory it is kept in its
//! encoded form: the key as 4 big-endian bytes followed by the payload (starting at the `.`).
//! Byte-wise comparison of encoded records orders them by key first and by payload on ties.
//!
//! Only non-negative keys are ordered numerically: a negative key has its sign bit set and so
//! compares greater than every non-negative one.

use std::cmp::Ordering;
use std::str;

use crate::error::SortError;

const KEY_LEN: usize = 4;
const SEPARATOR: u8 = b'.';

/// Encoded record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    /// Encodes a textual line (without the trailing newline).
    /// Returns [`None`] if the line has no `.` separator, such lines are dropped.
    pub fn encode(line: &[u8]) -> Result<Option<Record>, SortError> {
        let sep = match line.iter().position(|&b| b == SEPARATOR) {
            Some(sep) => sep,
            None => return Ok(None),
        };

        let key = parse_key(&line[..sep])?;
        let payload = &line[sep..];

        let mut bytes = Vec::with_capacity(KEY_LEN + payload.len());
        bytes.extend_from_slice(&key.to_be_bytes());
        bytes.extend_from_slice(payload);

        return Ok(Some(Record { bytes }));
    }

    /// Wraps bytes that are already in the encoded form.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, SortError> {
        if bytes.len() < KEY_LEN {
            return Err(SortError::FormatError(format!(
                "encoded record is {} bytes long, key needs {}",
                bytes.len(),
                KEY_LEN
            )));
        }

        return Ok(Record { bytes });
    }

    /// Record key.
    pub fn key(&self) -> i32 {
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&self.bytes[..KEY_LEN]);
        i32::from_be_bytes(key)
    }

    /// Record payload including the leading `.`.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[KEY_LEN..]
    }

    /// Splits the record back into its key and payload.
    pub fn decode(&self) -> (i32, &[u8]) {
        (self.key(), self.payload())
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false, an encoded record holds at least its key.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Compares two optional records, an absent record is greater than any present one.
pub fn compare(a: Option<&Record>, b: Option<&Record>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn parse_key(prefix: &[u8]) -> Result<i32, SortError> {
    let text = str::from_utf8(prefix).map_err(|_| SortError::ParseError {
        key: String::from_utf8_lossy(prefix).into_owned(),
        source: None,
    })?;

    text.parse::<i32>().map_err(|err| SortError::ParseError {
        key: text.to_owned(),
        source: Some(err),
    })
}
