//! Buffer primitives for the binary report format.
//!
//! All multi-byte values are little-endian. Strings are a 2-byte length
//! prefix followed by UTF-8 bytes. Maps are a 4-byte count prefix followed
//! by (key, value) pairs; key and value codecs are supplied by the caller,
//! which is how the report tree nests arbitrarily deep without the buffer
//! layer knowing its shape.
//!
//! `BufferReader` tracks its position and exposes the unconsumed remainder,
//! so composite structures decode themselves by repeated calls and a caller
//! can verify that a decode consumed exactly the encoded length.

use std::collections::BTreeMap;

use crate::utils::error::CodecError;

/// Growable byte buffer for encoding
#[derive(Debug, Default)]
pub struct BufferWriter {
    bytes: Vec<u8>,
}

impl BufferWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the writer and return the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Booleans are a single flag byte
    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    /// Write an in-memory `u64` into the 4-byte wire format.
    ///
    /// # Errors
    /// * `CodecError::ValueOutOfRange` - the value does not fit in 4 bytes
    pub fn write_uint(&mut self, field: &'static str, value: u64) -> Result<(), CodecError> {
        let narrowed =
            u32::try_from(value).map_err(|_| CodecError::ValueOutOfRange { field, value })?;
        self.write_u32(narrowed);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string
    ///
    /// # Errors
    /// * `CodecError::StringTooLong` - more than 65535 bytes
    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        let length =
            u16::try_from(value.len()).map_err(|_| CodecError::StringTooLong(value.len()))?;
        self.write_u16(length);
        self.bytes.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Write a count-prefixed ordered map with caller-supplied codecs
    pub fn write_map<K, V>(
        &mut self,
        map: &BTreeMap<K, V>,
        mut write_key: impl FnMut(&mut Self, &K) -> Result<(), CodecError>,
        mut write_value: impl FnMut(&mut Self, &V) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        let count = u32::try_from(map.len()).map_err(|_| CodecError::ValueOutOfRange {
            field: "map entry count",
            value: map.len() as u64,
        })?;
        self.write_u32(count);

        for (key, value) in map {
            write_key(self, key)?;
            write_value(self, value)?;
        }

        Ok(())
    }
}

/// Cursor over an encoded byte slice
#[derive(Debug)]
pub struct BufferReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    /// Create a reader over a byte slice
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// The unconsumed remainder of the buffer
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// True once every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, needed: usize, context: &'static str) -> Result<&'a [u8], CodecError> {
        let available = self.buf.len() - self.pos;
        if available < needed {
            return Err(CodecError::UnexpectedEof {
                context,
                needed,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, context)?[0])
    }

    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, CodecError> {
        let bytes = self.take(2, context)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, CodecError> {
        let bytes = self.take(4, context)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, CodecError> {
        let bytes = self.take(8, context)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, CodecError> {
        Ok(self.read_u8(context)? != 0)
    }

    /// Read a 4-byte wire integer into the in-memory `u64` form
    pub fn read_uint(&mut self, context: &'static str) -> Result<u64, CodecError> {
        Ok(u64::from(self.read_u32(context)?))
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self, context: &'static str) -> Result<String, CodecError> {
        let length = self.read_u16(context)? as usize;
        let bytes = self.take(length, context)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Read a count-prefixed ordered map with caller-supplied codecs
    pub fn read_map<K: Ord, V>(
        &mut self,
        context: &'static str,
        mut read_key: impl FnMut(&mut Self) -> Result<K, CodecError>,
        mut read_value: impl FnMut(&mut Self) -> Result<V, CodecError>,
    ) -> Result<BTreeMap<K, V>, CodecError> {
        let count = self.read_u32(context)?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = read_key(self)?;
            let value = read_value(self)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}
