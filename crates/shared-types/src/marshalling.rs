//! # Canonical Marshalling
//!
//! The single byte encoding used everywhere: on disk (trie values), for
//! hashing (transaction references, trie nodes) and across collaborator
//! boundaries. Two replicas that agree on the logical content of a record
//! must produce bit-identical bytes, so the encoding is canonical:
//!
//! - primitive fields are fixed-width big-endian;
//! - lengths and selectors use a compact unsigned varint, minimal form only;
//! - strings are length-prefixed UTF-8;
//! - big integers are length-prefixed two's-complement big-endian, minimal;
//! - arrays are a compact length followed by each element;
//! - every polymorphic encoding starts with a one-byte selector.

use crate::errors::MarshalError;
use num_bigint::BigInt;

/// Types with a canonical byte encoding.
pub trait Marshallable: Sized {
    /// Appends the canonical encoding of `self` to the writer.
    fn marshal(&self, w: &mut MarshalWriter);

    /// Decodes one value from the reader.
    fn unmarshal(r: &mut MarshalReader<'_>) -> Result<Self, MarshalError>;

    /// Encodes `self` into a fresh byte vector.
    fn to_bytes(&self) -> Vec<u8> {
        let mut w = MarshalWriter::new();
        self.marshal(&mut w);
        w.into_bytes()
    }

    /// Decodes a value from `bytes`, requiring full consumption.
    fn from_bytes(bytes: &[u8]) -> Result<Self, MarshalError> {
        let mut r = MarshalReader::new(bytes);
        let value = Self::unmarshal(&mut r)?;
        r.expect_end()?;
        Ok(value)
    }
}

// =============================================================================
// WRITER
// =============================================================================

/// Append-only encoder over a growable buffer.
#[derive(Default)]
pub struct MarshalWriter {
    buf: Vec<u8>,
}

impl MarshalWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consumes the writer, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes one raw byte (used for selectors and flags).
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes the IEEE-754 bit pattern, big-endian.
    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    /// Compact unsigned varint: 7 bits per byte, least-significant group
    /// first, high bit set on every byte except the last.
    pub fn write_compact_u64(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Raw bytes, no length header.
    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Compact length followed by the raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_compact_u64(bytes.len() as u64);
        self.write_fixed(bytes);
    }

    /// Length-prefixed UTF-8.
    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Length-prefixed two's-complement big-endian, minimal form.
    pub fn write_big_int(&mut self, v: &BigInt) {
        self.write_bytes(&v.to_signed_bytes_be());
    }

    /// Compact element count followed by each element's encoding.
    pub fn write_array<T: Marshallable>(&mut self, items: &[T]) {
        self.write_compact_u64(items.len() as u64);
        for item in items {
            item.marshal(self);
        }
    }
}

// =============================================================================
// READER
// =============================================================================

/// Bounds-checked decoder over a byte slice.
pub struct MarshalReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> MarshalReader<'a> {
    /// Creates a reader positioned at the start of `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails unless every byte has been consumed.
    pub fn expect_end(&self) -> Result<(), MarshalError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(MarshalError::TrailingBytes {
                remaining: self.remaining(),
            })
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MarshalError> {
        if self.remaining() < n {
            return Err(MarshalError::UnexpectedEof {
                wanted: n,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, MarshalError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, MarshalError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, MarshalError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_i16(&mut self) -> Result<i16, MarshalError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, MarshalError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, MarshalError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, MarshalError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, MarshalError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32, MarshalError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, MarshalError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Reads a compact varint, rejecting non-minimal and overlong forms.
    pub fn read_compact_u64(&mut self) -> Result<u64, MarshalError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(MarshalError::NonCanonical("compact int overflows 64 bits"));
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                // A trailing zero group would be a longer encoding of the
                // same number; only the value 0 may end with byte 0.
                if byte == 0 && shift != 0 {
                    return Err(MarshalError::NonCanonical("compact int has padding group"));
                }
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(MarshalError::NonCanonical("compact int longer than 10 bytes"));
            }
        }
    }

    /// Reads exactly `n` raw bytes.
    pub fn read_fixed(&mut self, n: usize) -> Result<&'a [u8], MarshalError> {
        self.take(n)
    }

    /// Reads a compact length followed by that many raw bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, MarshalError> {
        let len = self.read_compact_u64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<String, MarshalError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| MarshalError::InvalidUtf8)
    }

    /// Reads a length-prefixed two's-complement big integer.
    pub fn read_big_int(&mut self) -> Result<BigInt, MarshalError> {
        let bytes = self.read_bytes()?;
        let value = BigInt::from_signed_bytes_be(&bytes);
        // Reject padded encodings: re-encoding must give the same bytes.
        if value.to_signed_bytes_be() != bytes {
            return Err(MarshalError::NonCanonical("big integer not minimal"));
        }
        Ok(value)
    }

    /// Reads a compact element count followed by that many elements.
    pub fn read_array<T: Marshallable>(&mut self) -> Result<Vec<T>, MarshalError> {
        let len = self.read_compact_u64()? as usize;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(T::unmarshal(self)?);
        }
        Ok(items)
    }
}

// =============================================================================
// TESTS
// =============================================================================
