//! Chunked message framing.
//!
//! Every message is split into chunks, each prefixed with its length as a
//! big-endian `u16`, and terminated by a zero-length chunk:
//!
//! ```text
//! 00 03 B1 70 A0 00 00
//! ^len  ^payload ^end
//! ```
//!
//! A zero-length chunk that is not preceded by any payload is a NOOP sent by
//! the server to keep an idle connection alive. It is skipped.
//!
//! [`ChunkWriter`] and [`ChunkReader`] frame messages directly over an async
//! stream. [`ChunkCodec`] does the same for `tokio_util` framed transports.

mod buffer;
mod codec;
mod reader;
mod writer;

use std::fmt::Write as _;
use std::ops::Range;

pub use buffer::compact;
pub use codec::ChunkCodec;
pub use reader::ChunkReader;
pub use writer::ChunkWriter;

/// Largest payload a single chunk can carry.
pub const MAX_CHUNK_SIZE: usize = 65535;

/// Size of a chunk length prefix.
pub const CHUNK_HEADER_SIZE: usize = 2;

/// End of message marker (0x00 0x00)
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Outcome of scanning buffered bytes for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// At least `needed` bytes, counted from the start of the message, must
    /// be buffered before scanning can continue.
    Incomplete {
        /// Minimum buffered length
        needed: usize,
    },
    /// The buffer starts with a NOOP chunk. Skip two bytes.
    Noop,
    /// A complete message ends at `end`, end marker included.
    Complete {
        /// Offset just past the end marker
        end: usize,
    },
}

/// Incremental chunk scanner.
///
/// The scanner remembers how far it got, so feeding it the same buffer with
/// more bytes appended resumes where it stopped. Offsets are relative to the
/// start of the message, so the caller may move the buffer between calls as
/// long as the message start stays at offset zero.
#[derive(Debug, Default)]
pub struct ChunkScanner {
    pos: usize,
    spans: Vec<Range<usize>>,
}

impl ChunkScanner {
    /// Create a scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `buf`, which starts at a message boundary.
    pub fn scan(&mut self, buf: &[u8]) -> Scan {
        if self.pos == 0 {
            self.spans.clear();
        }
        loop {
            // Bytes needed: every payload seen so far plus one header per
            // chunk and one for the next header.
            let header_end = self.pos + CHUNK_HEADER_SIZE;
            if buf.len() < header_end {
                return Scan::Incomplete { needed: header_end };
            }

            let size = u16::from_be_bytes([buf[self.pos], buf[self.pos + 1]]) as usize;
            if size == 0 {
                self.pos = 0;
                if self.spans.is_empty() {
                    return Scan::Noop;
                }
                return Scan::Complete { end: header_end };
            }

            self.spans.push(header_end..header_end + size);
            self.pos = header_end + size;
        }
    }

    /// Whether no chunk of the next message has been seen yet.
    pub fn at_message_start(&self) -> bool {
        self.pos == 0
    }

    /// Payload spans of the last complete message.
    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    /// Total payload length of the spans scanned so far.
    pub fn payload_len(&self) -> usize {
        self.spans.iter().map(|span| span.len()).sum()
    }
}

/// Render bytes as space-separated hex for trace logs.
pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
