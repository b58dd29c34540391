//! Little-endian, length-prefixed field encoding for registry instructions.
//!
//! The layout is fixed by the registry program's deserializer (Borsh):
//!
//! ```text
//! string        u32 LE byte length, then raw UTF-8 bytes (no padding)
//! u32/i64/u64   fixed-width little-endian
//! Option<T>     u8 tag (0 = None, 1 = Some) followed by T when present
//! ```
//!
//! A layout mistake is not reported back as a decodable error; the program
//! simply rejects the instruction, so nothing here may reorder or pad fields.

use crate::error::WireError;

/// Encode a string as a u32 LE length prefix followed by its UTF-8 bytes.
pub fn encode_string(value: &str) -> Result<Vec<u8>, WireError> {
    let len = u32::try_from(value.len()).map_err(|_| {
        WireError::EncodingError(format!(
            "string of {} bytes exceeds u32 length prefix",
            value.len()
        ))
    })?;

    let mut out = Vec::with_capacity(4 + value.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(out)
}

pub fn encode_u32_le(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

pub fn encode_i64_le(value: i64) -> [u8; 8] {
    value.to_le_bytes()
}

pub fn encode_u64_le(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Encode an optional i64 with a one-byte presence tag.
pub fn encode_option_i64(value: Option<i64>) -> Vec<u8> {
    match value {
        None => vec![0],
        Some(v) => {
            let mut out = Vec::with_capacity(9);
            out.push(1);
            out.extend_from_slice(&encode_i64_le(v));
            out
        }
    }
}

/// Accumulates encoded fields in call order.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing prefix (typically an instruction discriminator).
    pub fn with_prefix(prefix: &[u8]) -> Self {
        Self {
            buf: prefix.to_vec(),
        }
    }

    pub fn put_string(&mut self, value: &str) -> Result<&mut Self, WireError> {
        let encoded = encode_string(value)?;
        self.buf.extend_from_slice(&encoded);
        Ok(self)
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&encode_u32_le(value));
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&encode_i64_le(value));
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&encode_u64_le(value));
        self
    }

    pub fn put_option_i64(&mut self, value: Option<i64>) -> &mut Self {
        self.buf.extend_from_slice(&encode_option_i64(value));
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Fixed-offset reader over raw account data.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn skip(&mut self, n: usize) -> Result<(), WireError> {
        self.take(n).map(|_| ())
    }

    pub fn read_bytes32(&mut self) -> Result<[u8; 32], WireError> {
        let slice = self.take(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u64_le(&mut self) -> Result<u64, WireError> {
        let slice = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(slice);
        Ok(u64::from_le_bytes(out))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                WireError::AccountDataError(format!(
                    "need {n} bytes at offset {}, have {}",
                    self.offset,
                    self.data.len()
                ))
            })?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }
}
