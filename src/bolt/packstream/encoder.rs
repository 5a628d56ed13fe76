//! PackStream encoder.

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use super::marker::*;
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Largest length a sized value may declare.
const MAX_LEN: usize = i32::MAX as usize;

/// PackStream encoder that writes values to a byte buffer.
///
/// Every value uses the narrowest encoding that holds it.
pub struct PackStreamEncoder {
    buffer: BytesMut,
}

impl PackStreamEncoder {
    /// Create a new encoder with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new encoder with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer, keeping its allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode a PackStreamValue.
    pub fn encode(&mut self, value: &PackStreamValue) -> Result<(), PackStreamError> {
        match value {
            PackStreamValue::Null => self.encode_null(),
            PackStreamValue::Boolean(b) => self.encode_bool(*b),
            PackStreamValue::Integer(i) => self.encode_int(*i),
            PackStreamValue::Float(f) => self.encode_float(*f),
            PackStreamValue::Bytes(b) => return self.encode_bytes(b),
            PackStreamValue::String(s) => return self.encode_string(s),
            PackStreamValue::List(l) => return self.encode_list(l),
            PackStreamValue::Map(m) => return self.encode_map(m),
            PackStreamValue::Structure(s) => return self.encode_structure(s),
        }
        Ok(())
    }

    /// Encode null.
    pub fn encode_null(&mut self) {
        self.buffer.put_u8(NULL);
    }

    /// Encode a boolean.
    pub fn encode_bool(&mut self, value: bool) {
        self.buffer.put_u8(if value { TRUE } else { FALSE });
    }

    /// Encode an integer using the smallest representation.
    pub fn encode_int(&mut self, value: i64) {
        if fits_tiny_int(value) {
            self.buffer.put_u8(value as u8);
        } else if i8::try_from(value).is_ok() {
            self.buffer.put_u8(INT_8);
            self.buffer.put_i8(value as i8);
        } else if i16::try_from(value).is_ok() {
            self.buffer.put_u8(INT_16);
            self.buffer.put_i16(value as i16);
        } else if i32::try_from(value).is_ok() {
            self.buffer.put_u8(INT_32);
            self.buffer.put_i32(value as i32);
        } else {
            self.buffer.put_u8(INT_64);
            self.buffer.put_i64(value);
        }
    }

    /// Encode a float (always 64-bit).
    pub fn encode_float(&mut self, value: f64) {
        self.buffer.put_u8(FLOAT_64);
        self.buffer.put_f64(value);
    }

    /// Encode bytes. There is no tiny form for bytes.
    pub fn encode_bytes(&mut self, value: &[u8]) -> Result<(), PackStreamError> {
        self.write_len_header(None, [BYTES_8, BYTES_16, BYTES_32], value.len(), "Bytes")?;
        self.buffer.put_slice(value);
        Ok(())
    }

    /// Encode a string.
    pub fn encode_string(&mut self, value: &str) -> Result<(), PackStreamError> {
        let bytes = value.as_bytes();
        self.write_len_header(
            Some(TINY_STRING),
            [STRING_8, STRING_16, STRING_32],
            bytes.len(),
            "String",
        )?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Encode a list.
    pub fn encode_list(&mut self, values: &[PackStreamValue]) -> Result<(), PackStreamError> {
        self.write_len_header(Some(TINY_LIST), [LIST_8, LIST_16, LIST_32], values.len(), "List")?;
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a map.
    pub fn encode_map(
        &mut self,
        map: &HashMap<String, PackStreamValue>,
    ) -> Result<(), PackStreamError> {
        self.write_len_header(Some(TINY_MAP), [MAP_8, MAP_16, MAP_32], map.len(), "Map")?;
        for (key, value) in map {
            self.encode_string(key)?;
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a structure header: field count and signature.
    pub fn encode_struct_header(&mut self, field_count: usize, tag: u8) -> Result<(), PackStreamError> {
        if field_count > u16::MAX as usize {
            return Err(PackStreamError::ValueTooLarge("Structure", field_count));
        }
        if field_count <= TINY_MAX_LEN {
            self.buffer.put_u8(TINY_STRUCT | field_count as u8);
        } else if field_count <= u8::MAX as usize {
            self.buffer.put_u8(STRUCT_8);
            self.buffer.put_u8(field_count as u8);
        } else {
            self.buffer.put_u8(STRUCT_16);
            self.buffer.put_u16(field_count as u16);
        }
        self.buffer.put_u8(tag);
        Ok(())
    }

    /// Encode a structure.
    pub fn encode_structure(&mut self, s: &PackStreamStructure) -> Result<(), PackStreamError> {
        self.encode_struct_header(s.fields.len(), s.tag)?;
        for field in &s.fields {
            self.encode(field)?;
        }
        Ok(())
    }

    fn write_len_header(
        &mut self,
        tiny: Option<u8>,
        [w8, w16, w32]: [u8; 3],
        len: usize,
        what: &'static str,
    ) -> Result<(), PackStreamError> {
        if len > MAX_LEN {
            return Err(PackStreamError::ValueTooLarge(what, len));
        }
        match tiny {
            Some(base) if len <= TINY_MAX_LEN => self.buffer.put_u8(base | len as u8),
            _ if len <= u8::MAX as usize => {
                self.buffer.put_u8(w8);
                self.buffer.put_u8(len as u8);
            }
            _ if len <= u16::MAX as usize => {
                self.buffer.put_u8(w16);
                self.buffer.put_u16(len as u16);
            }
            _ => {
                self.buffer.put_u8(w32);
                self.buffer.put_u32(len as u32);
            }
        }
        Ok(())
    }
}

impl Default for PackStreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single value.
pub fn encode(value: &PackStreamValue) -> Result<BytesMut, PackStreamError> {
    let mut encoder = PackStreamEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_null_and_bool() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_null();
        enc.encode_bool(true);
        enc.encode_bool(false);
        assert_eq!(enc.as_bytes(), &[0xC0, 0xC3, 0xC2]);
    }

    #[test]
    fn test_encode_tiny_int() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_int(0);
        enc.encode_int(100);
        enc.encode_int(127);
        enc.encode_int(-16);
        enc.encode_int(-1);
        assert_eq!(enc.as_bytes(), &[0x00, 0x64, 0x7F, 0xF0, 0xFF]);
    }

    #[test]
    fn test_encode_narrowest_int() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_int(-17);
        assert_eq!(enc.as_bytes(), &[0xC8, 0xEF]);

        enc.clear();
        enc.encode_int(130);
        assert_eq!(enc.as_bytes(), &[0xC9, 0x00, 0x82]);

        enc.clear();
        enc.encode_int(-128);
        assert_eq!(enc.as_bytes(), &[0xC8, 0x80]);

        enc.clear();
        enc.encode_int(100000);
        assert_eq!(enc.as_bytes(), &[0xCA, 0x00, 0x01, 0x86, 0xA0]);

        enc.clear();
        enc.encode_int(i64::MAX);
        assert_eq!(enc.as_bytes()[0], 0xCB);
        assert_eq!(enc.len(), 9);
    }

    #[test]
    fn test_encode_float() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_float(1.0);
        assert_eq!(enc.as_bytes(), &[0xC1, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_string_widths() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_string("hello").unwrap();
        assert_eq!(enc.as_bytes()[0], 0x85);
        assert_eq!(&enc.as_bytes()[1..], b"hello");

        enc.clear();
        enc.encode_string("").unwrap();
        assert_eq!(enc.as_bytes(), &[0x80]);

        enc.clear();
        enc.encode_string(&"a".repeat(16)).unwrap();
        assert_eq!(&enc.as_bytes()[..2], &[0xD0, 16]);

        enc.clear();
        enc.encode_string(&"a".repeat(256)).unwrap();
        assert_eq!(&enc.as_bytes()[..3], &[0xD1, 0x01, 0x00]);

        enc.clear();
        enc.encode_string(&"a".repeat(65536)).unwrap();
        assert_eq!(&enc.as_bytes()[..5], &[0xD2, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_bytes_has_no_tiny_form() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(enc.as_bytes(), &[0xCC, 0x03, 1, 2, 3]);

        enc.clear();
        enc.encode_bytes(&[]).unwrap();
        assert_eq!(enc.as_bytes(), &[0xCC, 0x00]);
    }

    #[test]
    fn test_encode_collections() {
        let list = vec![
            PackStreamValue::Integer(1),
            PackStreamValue::Integer(2),
            PackStreamValue::Integer(3),
        ];
        let mut enc = PackStreamEncoder::new();
        enc.encode_list(&list).unwrap();
        assert_eq!(enc.as_bytes(), &[0x93, 1, 2, 3]);

        enc.clear();
        let mut map = HashMap::new();
        map.insert("a".to_string(), PackStreamValue::Integer(1));
        enc.encode_map(&map).unwrap();
        assert_eq!(enc.as_bytes(), &[0xA1, 0x81, b'a', 1]);

        enc.clear();
        enc.encode_list(&vec![PackStreamValue::Null; 16]).unwrap();
        assert_eq!(&enc.as_bytes()[..2], &[0xD4, 16]);
    }

    #[test]
    fn test_encode_structure() {
        let s = PackStreamStructure::new(0x4E, vec![PackStreamValue::Integer(1)]);
        let mut enc = PackStreamEncoder::new();
        enc.encode_structure(&s).unwrap();
        assert_eq!(enc.as_bytes(), &[0xB1, 0x4E, 1]);
    }

    #[test]
    fn test_struct_header_widths() {
        let mut enc = PackStreamEncoder::new();
        enc.encode_struct_header(16, 0x10).unwrap();
        assert_eq!(enc.as_bytes(), &[0xDC, 16, 0x10]);

        enc.clear();
        enc.encode_struct_header(300, 0x10).unwrap();
        assert_eq!(enc.as_bytes(), &[0xDD, 0x01, 0x2C, 0x10]);
    }

    #[test]
    fn test_too_many_struct_fields() {
        let s = PackStreamStructure::new(0x01, vec![PackStreamValue::Null; 65536]);
        let err = encode(&PackStreamValue::Structure(s)).unwrap_err();
        assert_eq!(err, PackStreamError::ValueTooLarge("Structure", 65536));
    }
}
