//! PackStream decoder.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;

use super::marker::{self, *};
use super::source::{ByteSource, SegmentedSource, SliceSource, StreamSource};
use super::structures::StructTable;
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Deepest nesting of lists, maps and structures the decoder accepts.
pub const MAX_DEPTH: usize = 1024;

/// PackStream decoder over any [`ByteSource`].
///
/// Structures are resolved through the injected [`StructTable`]; a signature
/// the table does not know is an error.
pub struct PackStreamDecoder<'t, S> {
    source: S,
    structs: &'t StructTable,
}

impl<'t, S: ByteSource> PackStreamDecoder<'t, S> {
    /// Create a decoder reading from `source`.
    pub fn new(source: S, structs: &'t StructTable) -> Self {
        Self { source, structs }
    }

    /// Borrow the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Give the source back.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Classify the next value without consuming it.
    pub fn peek_type(&mut self) -> Result<PackType, PackStreamError> {
        marker::pack_type(self.source.peek_u8()?)
    }

    /// Decode the next value.
    ///
    /// Containers nested more than [`MAX_DEPTH`] levels deep are rejected.
    pub fn decode(&mut self) -> Result<PackStreamValue, PackStreamError> {
        self.decode_at(0)
    }

    fn decode_at(&mut self, depth: usize) -> Result<PackStreamValue, PackStreamError> {
        let kind = self.peek_type()?;
        if depth >= MAX_DEPTH && matches!(kind, PackType::List | PackType::Map | PackType::Struct) {
            return Err(PackStreamError::NestingTooDeep(MAX_DEPTH));
        }
        match kind {
            PackType::Null => {
                self.source.read_u8()?;
                Ok(PackStreamValue::Null)
            }
            PackType::Boolean => Ok(PackStreamValue::Boolean(self.source.read_u8()? == TRUE)),
            PackType::Integer => self.read_int().map(PackStreamValue::Integer),
            PackType::Float => {
                self.source.read_u8()?;
                let raw = self.source.read_array::<8>()?;
                Ok(PackStreamValue::Float(f64::from_be_bytes(raw)))
            }
            PackType::Bytes => {
                let len = self.read_bytes_header()?;
                let bytes = self.source.read_exact(len)?;
                Ok(PackStreamValue::Bytes(bytes.into_owned()))
            }
            PackType::String => self.read_string().map(PackStreamValue::String),
            PackType::List => {
                let len = self.read_list_header()?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode_at(depth + 1)?);
                }
                Ok(PackStreamValue::List(items))
            }
            PackType::Map => {
                let len = self.read_map_header()?;
                let mut map = HashMap::with_capacity(len.min(1024));
                for _ in 0..len {
                    if self.peek_type()? != PackType::String {
                        return Err(PackStreamError::InvalidMapKey);
                    }
                    let key = self.read_string()?;
                    let value = self.decode_at(depth + 1)?;
                    map.insert(key, value);
                }
                Ok(PackStreamValue::Map(map))
            }
            PackType::Struct => {
                let (field_count, tag) = self.read_struct_header()?;
                let mut fields = Vec::with_capacity(field_count.min(64));
                for _ in 0..field_count {
                    fields.push(self.decode_at(depth + 1)?);
                }
                self.structs.resolve(PackStreamStructure::new(tag, fields))
            }
        }
    }

    /// Read a structure header, returning the field count and signature.
    ///
    /// The fields are left in the source. Message-level framing uses this to
    /// read the message signature before decoding its fields.
    pub fn read_struct_header(&mut self) -> Result<(usize, u8), PackStreamError> {
        let m = self.source.read_u8()?;
        let field_count = match m {
            STRUCT_8 => self.source.read_u8()? as usize,
            STRUCT_16 => u16::from_be_bytes(self.source.read_array()?) as usize,
            _ if m & 0xF0 == TINY_STRUCT => tiny_len(m),
            _ => return Err(unexpected(m, "structure")),
        };
        let tag = self.source.read_u8()?;
        Ok((field_count, tag))
    }

    fn read_int(&mut self) -> Result<i64, PackStreamError> {
        let m = self.source.read_u8()?;
        let value = match m {
            INT_8 => self.source.read_u8()? as i8 as i64,
            INT_16 => i16::from_be_bytes(self.source.read_array()?) as i64,
            INT_32 => i32::from_be_bytes(self.source.read_array()?) as i64,
            INT_64 => i64::from_be_bytes(self.source.read_array()?),
            _ if is_tiny_int(m) => m as i8 as i64,
            _ => return Err(unexpected(m, "integer")),
        };
        Ok(value)
    }

    fn read_string(&mut self) -> Result<String, PackStreamError> {
        let len = self.read_sized_header(TINY_STRING, [STRING_8, STRING_16, STRING_32], "String")?;
        match self.source.read_exact(len)? {
            Cow::Borrowed(b) => std::str::from_utf8(b)
                .map(str::to_owned)
                .map_err(|e| PackStreamError::InvalidUtf8(e.to_string())),
            Cow::Owned(v) => {
                String::from_utf8(v).map_err(|e| PackStreamError::InvalidUtf8(e.to_string()))
            }
        }
    }

    fn read_bytes_header(&mut self) -> Result<usize, PackStreamError> {
        let m = self.source.read_u8()?;
        self.read_len(m, [BYTES_8, BYTES_16, BYTES_32], "Bytes")
    }

    fn read_list_header(&mut self) -> Result<usize, PackStreamError> {
        self.read_sized_header(TINY_LIST, [LIST_8, LIST_16, LIST_32], "List")
    }

    fn read_map_header(&mut self) -> Result<usize, PackStreamError> {
        self.read_sized_header(TINY_MAP, [MAP_8, MAP_16, MAP_32], "Map")
    }

    fn read_sized_header(
        &mut self,
        tiny: u8,
        wide: [u8; 3],
        what: &'static str,
    ) -> Result<usize, PackStreamError> {
        let m = self.source.read_u8()?;
        if m & 0xF0 == tiny {
            return Ok(tiny_len(m));
        }
        self.read_len(m, wide, what)
    }

    fn read_len(
        &mut self,
        m: u8,
        [w8, w16, w32]: [u8; 3],
        what: &'static str,
    ) -> Result<usize, PackStreamError> {
        if m == w8 {
            Ok(self.source.read_u8()? as usize)
        } else if m == w16 {
            Ok(u16::from_be_bytes(self.source.read_array()?) as usize)
        } else if m == w32 {
            let len = u32::from_be_bytes(self.source.read_array()?);
            if len > i32::MAX as u32 {
                return Err(PackStreamError::LengthOverflow(what, len));
            }
            Ok(len as usize)
        } else {
            Err(unexpected(m, what))
        }
    }
}

fn unexpected(m: u8, what: &str) -> PackStreamError {
    PackStreamError::InvalidStructure(format!("expected {} marker, found 0x{:02X}", what, m))
}

/// Decode a single value from bytes using the latest struct table.
pub fn decode(data: &[u8]) -> Result<PackStreamValue, PackStreamError> {
    decode_with(data, &StructTable::v5())
}

/// Decode a single value from a contiguous span.
pub fn decode_with(data: &[u8], structs: &StructTable) -> Result<PackStreamValue, PackStreamError> {
    PackStreamDecoder::new(SliceSource::new(data), structs).decode()
}

/// Decode a single value laid out across several spans.
pub fn decode_segments(
    segments: &[&[u8]],
    structs: &StructTable,
) -> Result<PackStreamValue, PackStreamError> {
    PackStreamDecoder::new(SegmentedSource::new(segments.iter().copied()), structs).decode()
}

/// Decode a single value from a blocking reader.
pub fn decode_stream(
    reader: impl Read,
    structs: &StructTable,
) -> Result<PackStreamValue, PackStreamError> {
    PackStreamDecoder::new(StreamSource::new(reader), structs).decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_null() {
        let value = decode(&[0xC0]).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_decode_bool() {
        assert_eq!(decode(&[0xC3]).unwrap(), PackStreamValue::Boolean(true));
        assert_eq!(decode(&[0xC2]).unwrap(), PackStreamValue::Boolean(false));
    }

    #[test]
    fn test_decode_tiny_int() {
        assert_eq!(decode(&[0x00]).unwrap(), PackStreamValue::Integer(0));
        assert_eq!(decode(&[0x7F]).unwrap(), PackStreamValue::Integer(127));
        assert_eq!(decode(&[0xF0]).unwrap(), PackStreamValue::Integer(-16));
        assert_eq!(decode(&[0xFF]).unwrap(), PackStreamValue::Integer(-1));
    }

    #[test]
    fn test_decode_sized_ints() {
        assert_eq!(decode(&[0xC8, 0xEF]).unwrap(), PackStreamValue::Integer(-17));
        assert_eq!(decode(&[0xC9, 0x00, 0x82]).unwrap(), PackStreamValue::Integer(130));
        assert_eq!(
            decode(&[0xCA, 0x00, 0x01, 0x86, 0xA0]).unwrap(),
            PackStreamValue::Integer(100000)
        );
        let data = [0xCB, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode(&data).unwrap(), PackStreamValue::Integer(i64::MAX));
    }

    #[test]
    fn test_decode_float() {
        let data = [0xC1, 0x40, 0x09, 0x1E, 0xB8, 0x51, 0xEB, 0x85, 0x1F];
        let f = decode(&data).unwrap().as_float().unwrap();
        assert!((f - 3.14).abs() < 0.001);
    }

    #[test]
    fn test_decode_strings() {
        let data = [0x85, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(decode(&data).unwrap(), PackStreamValue::String("hello".into()));
        assert_eq!(decode(&[0x80]).unwrap(), PackStreamValue::String(String::new()));

        let mut data = vec![0xD0, 20];
        data.extend_from_slice(&[b'a'; 20]);
        assert_eq!(decode(&data).unwrap(), PackStreamValue::String("a".repeat(20)));
    }

    #[test]
    fn test_decode_bytes() {
        let data = [0xCC, 0x03, 1, 2, 3];
        assert_eq!(decode(&data).unwrap(), PackStreamValue::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_decode_list_and_map() {
        let list = decode(&[0x93, 1, 2, 3]).unwrap();
        assert_eq!(list.as_list().map(|l| l.len()), Some(3));

        let map = decode(&[0xA1, 0x81, b'a', 1]).unwrap();
        assert_eq!(map.as_map().unwrap().get("a"), Some(&PackStreamValue::Integer(1)));
    }

    #[test]
    fn test_non_string_map_key() {
        let err = decode(&[0xA1, 0x01, 0x01]).unwrap_err();
        assert_eq!(err, PackStreamError::InvalidMapKey);
    }

    #[test]
    fn test_length_over_i32_max() {
        let err = decode(&[0xD2, 0x80, 0x00, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, PackStreamError::LengthOverflow("String", 0x8000_0000));

        let err = decode(&[0xD6, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(err, PackStreamError::LengthOverflow("List", u32::MAX));
    }

    #[test]
    fn test_unknown_marker() {
        assert_eq!(decode(&[0xE5]).unwrap_err(), PackStreamError::UnknownMarker(0xE5));
    }

    #[test]
    fn test_decode_unexpected_eof() {
        assert_eq!(decode(&[0xC9]).unwrap_err(), PackStreamError::UnexpectedEof);
        assert_eq!(decode(&[0x93, 1, 2]).unwrap_err(), PackStreamError::UnexpectedEof);
        assert_eq!(decode(b"").unwrap_err(), PackStreamError::UnexpectedEof);
    }

    #[test]
    fn test_nesting_at_limit_decodes() {
        let mut data = vec![0x91; MAX_DEPTH];
        data.push(0xC0);
        let mut value = decode(&data).unwrap();
        for _ in 0..MAX_DEPTH {
            value = value.as_list().unwrap()[0].clone();
        }
        assert!(value.is_null());
    }

    #[test]
    fn test_nesting_past_limit_is_rejected() {
        let mut lists = vec![0x91; 200_000];
        lists.push(0xC0);
        assert_eq!(decode(&lists).unwrap_err(), PackStreamError::NestingTooDeep(MAX_DEPTH));
        assert_eq!(
            decode_stream(&lists[..], &StructTable::v5()).unwrap_err(),
            PackStreamError::NestingTooDeep(MAX_DEPTH)
        );
        let (head, tail) = lists.split_at(1000);
        assert_eq!(
            decode_segments(&[head, tail], &StructTable::v5()).unwrap_err(),
            PackStreamError::NestingTooDeep(MAX_DEPTH)
        );

        let mut maps = Vec::new();
        for _ in 0..=MAX_DEPTH {
            maps.extend_from_slice(&[0xA1, 0x81, b'k']);
        }
        maps.push(0xC0);
        assert_eq!(decode(&maps).unwrap_err(), PackStreamError::NestingTooDeep(MAX_DEPTH));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = decode(&[0x82, 0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidUtf8(_)));

        let err = decode_segments(&[&[0x82u8, 0xFF][..], &[0xFE][..]], &StructTable::v5()).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidUtf8(_)));
    }

    #[test]
    fn test_structure_goes_through_table() {
        // Date with one field
        let value = decode(&[0xB1, 0x44, 0x05]).unwrap();
        let s = value.as_structure().unwrap();
        assert_eq!(s.tag, 0x44);
        assert_eq!(s.fields, vec![PackStreamValue::Integer(5)]);

        // Date with the wrong field count
        let err = decode(&[0xB2, 0x44, 0x05, 0x06]).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidStructure(_)));

        let err = decode_with(&[0xB0, 0x44], &StructTable::empty()).unwrap_err();
        assert_eq!(err, PackStreamError::UnknownStructure(0x44));
    }

    #[test]
    fn test_struct_header_leaves_fields() {
        let table = StructTable::empty();
        let data = [0xB1, 0x70, 0xA0];
        let mut decoder = PackStreamDecoder::new(SliceSource::new(&data), &table);
        assert_eq!(decoder.read_struct_header().unwrap(), (1, 0x70));
        assert_eq!(decoder.peek_type().unwrap(), PackType::Map);
        assert!(decoder.decode().unwrap().as_map().unwrap().is_empty());
        assert_eq!(decoder.source().remaining(), 0);
    }

    #[test]
    fn test_sequential_values() {
        let table = StructTable::empty();
        let data = [0x01, 0x81, b'x', 0xC0];
        let mut decoder = PackStreamDecoder::new(SliceSource::new(&data), &table);
        assert_eq!(decoder.decode().unwrap(), PackStreamValue::Integer(1));
        assert_eq!(decoder.decode().unwrap(), PackStreamValue::String("x".into()));
        assert_eq!(decoder.decode().unwrap(), PackStreamValue::Null);
        assert_eq!(decoder.into_source().position(), 4);
    }
}
