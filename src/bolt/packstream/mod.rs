//! PackStream serialization format.
//!
//! PackStream is the binary serialization format used by the Bolt protocol
//! to encode values for transmission between client and server.
//!
//! # Supported Types
//!
//! - **Null**: Single byte marker
//! - **Boolean**: True/False markers
//! - **Integer**: Narrowest of tiny, 8, 16, 32 or 64-bit forms
//! - **Float**: 64-bit IEEE 754
//! - **String**: UTF-8 encoded, variable length prefix
//! - **Bytes**: Raw bytes, variable length prefix
//! - **List**: Heterogeneous collections
//! - **Map**: String keys to arbitrary values
//! - **Structure**: Tagged structures, validated through a [`StructTable`]
//!
//! # Decoding strategies
//!
//! The grammar lives in [`PackStreamDecoder`], which is generic over a
//! [`ByteSource`]. Three sources are provided:
//!
//! - [`SliceSource`] reads a contiguous borrowed span without copying
//! - [`SegmentedSource`] reads a sequence of spans and only copies values
//!   that straddle a segment boundary
//! - [`StreamSource`] reads from a blocking [`std::io::Read`]
//!
//! All three produce identical values for identical bytes.

pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod source;
pub mod structures;
pub mod types;

pub use decoder::{
    decode, decode_segments, decode_stream, decode_with, PackStreamDecoder, MAX_DEPTH,
};
pub use encoder::{encode, PackStreamEncoder};
pub use marker::PackType;
pub use source::{ByteSource, SegmentedSource, SliceSource, StreamSource};
pub use structures::{
    PackStreamDate, PackStreamDuration, PackStreamNode, PackStreamPoint,
    PackStreamRelationship, StructHandler, StructTable,
};
pub use types::{PackStreamStructure, PackStreamValue};

use thiserror::Error;

/// PackStream errors.
///
/// Every variant is fatal to the read or write that produced it; the codec
/// never resynchronises on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackStreamError {
    /// Unexpected end of input
    #[error("Unexpected end of PackStream data")]
    UnexpectedEof,

    /// Unknown marker byte
    #[error("Unknown PackStream marker: 0x{0:02X}")]
    UnknownMarker(u8),

    /// Invalid UTF-8 in string
    #[error("Invalid UTF-8 in string: {0}")]
    InvalidUtf8(String),

    /// Map key was not a string
    #[error("Map keys must be strings")]
    InvalidMapKey,

    /// Value too large to encode
    #[error("{0} too large: {1}")]
    ValueTooLarge(&'static str, usize),

    /// A 32-bit length prefix does not fit a signed 32-bit integer
    #[error("{0} length {1} exceeds the maximum supported size")]
    LengthOverflow(&'static str, u32),

    /// Lists, maps and structures nested past the depth limit
    #[error("PackStream nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// No struct handler is registered for the signature
    #[error("No struct handler registered for signature 0x{0:02X}")]
    UnknownStructure(u8),

    /// Structure does not have the expected shape
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// The underlying blocking reader failed
    #[error("I/O error while decoding: {0}")]
    Io(String),
}
