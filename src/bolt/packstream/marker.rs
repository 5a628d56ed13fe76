//! PackStream marker bytes.
//!
//! Every value starts with a marker byte. Small values (tiny ints) and short
//! containers (tiny string/list/map/struct) carry their payload or length in
//! the low nibble of the marker itself.

use super::PackStreamError;

pub const NULL: u8 = 0xC0;
pub const FLOAT_64: u8 = 0xC1;
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

pub const BYTES_8: u8 = 0xCC;
pub const BYTES_16: u8 = 0xCD;
pub const BYTES_32: u8 = 0xCE;

pub const TINY_STRING: u8 = 0x80;
pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;
pub const STRING_32: u8 = 0xD2;

pub const TINY_LIST: u8 = 0x90;
pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;
pub const LIST_32: u8 = 0xD6;

pub const TINY_MAP: u8 = 0xA0;
pub const MAP_8: u8 = 0xD8;
pub const MAP_16: u8 = 0xD9;
pub const MAP_32: u8 = 0xDA;

pub const TINY_STRUCT: u8 = 0xB0;
pub const STRUCT_8: u8 = 0xDC;
pub const STRUCT_16: u8 = 0xDD;

/// Largest length (or field count) that fits in a tiny marker's low nibble.
pub const TINY_MAX_LEN: usize = 15;

/// Smallest integer with a single-byte encoding.
pub const TINY_INT_MIN: i64 = -16;
/// Largest integer with a single-byte encoding.
pub const TINY_INT_MAX: i64 = 127;

/// The type a marker byte introduces.
///
/// Obtained by peeking the marker; the marker itself is left in the source
/// so the typed read that follows can consume it along with any length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackType {
    /// `0xC0`
    Null,
    /// `0xC2` / `0xC3`
    Boolean,
    /// Tiny int or `0xC8..=0xCB`
    Integer,
    /// `0xC1`
    Float,
    /// `0xCC..=0xCE`
    Bytes,
    /// `0x80..=0x8F` or `0xD0..=0xD2`
    String,
    /// `0x90..=0x9F` or `0xD4..=0xD6`
    List,
    /// `0xA0..=0xAF` or `0xD8..=0xDA`
    Map,
    /// `0xB0..=0xBF`, `0xDC` or `0xDD`
    Struct,
}

/// Classify a marker byte.
pub fn pack_type(marker: u8) -> Result<PackType, PackStreamError> {
    let high = marker & 0xF0;
    let kind = match marker {
        NULL => PackType::Null,
        FALSE | TRUE => PackType::Boolean,
        FLOAT_64 => PackType::Float,
        INT_8..=INT_64 => PackType::Integer,
        BYTES_8..=BYTES_32 => PackType::Bytes,
        STRING_8..=STRING_32 => PackType::String,
        LIST_8..=LIST_32 => PackType::List,
        MAP_8..=MAP_32 => PackType::Map,
        STRUCT_8 | STRUCT_16 => PackType::Struct,
        _ if is_tiny_int(marker) => PackType::Integer,
        _ if high == TINY_STRING => PackType::String,
        _ if high == TINY_LIST => PackType::List,
        _ if high == TINY_MAP => PackType::Map,
        _ if high == TINY_STRUCT => PackType::Struct,
        _ => return Err(PackStreamError::UnknownMarker(marker)),
    };
    Ok(kind)
}

/// Tiny ints occupy `0x00..=0x7F` and `0xF0..=0xFF`.
#[inline]
pub fn is_tiny_int(marker: u8) -> bool {
    marker <= 0x7F || marker >= 0xF0
}

#[inline]
pub fn fits_tiny_int(value: i64) -> bool {
    (TINY_INT_MIN..=TINY_INT_MAX).contains(&value)
}

/// Length carried in the low nibble of a tiny marker.
#[inline]
pub fn tiny_len(marker: u8) -> usize {
    (marker & 0x0F) as usize
}
