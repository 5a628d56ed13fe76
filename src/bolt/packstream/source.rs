//! Byte sources for the PackStream decoder.

use std::borrow::Cow;
use std::io::{ErrorKind, Read};

use super::PackStreamError;

/// A source of bytes the decoder can peek and consume.
///
/// `read_exact` returns borrowed bytes whenever the source can hand out a
/// contiguous view, and an owned copy otherwise.
pub trait ByteSource {
    /// Return the next byte without consuming it.
    fn peek_u8(&mut self) -> Result<u8, PackStreamError>;

    /// Consume and return the next byte.
    fn read_u8(&mut self) -> Result<u8, PackStreamError>;

    /// Consume exactly `len` bytes.
    fn read_exact(&mut self, len: usize) -> Result<Cow<'_, [u8]>, PackStreamError>;

    /// Consume `N` bytes into a fixed array.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PackStreamError>
    where
        Self: Sized,
    {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.read_exact(N)?);
        Ok(out)
    }
}

/// A borrowed contiguous span.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Create a source over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn peek_u8(&mut self) -> Result<u8, PackStreamError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(PackStreamError::UnexpectedEof)
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> Result<Cow<'_, [u8]>, PackStreamError> {
        if self.remaining() < len {
            return Err(PackStreamError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(Cow::Borrowed(bytes))
    }
}

/// A sequence of borrowed segments read as one logical stream.
///
/// Reads that fit in the current segment are zero-copy; reads that cross a
/// boundary are gathered into an owned buffer.
#[derive(Debug, Clone)]
pub struct SegmentedSource<'a> {
    segments: Vec<&'a [u8]>,
    index: usize,
    offset: usize,
}

impl<'a> SegmentedSource<'a> {
    /// Create a source over `segments`, read in order.
    pub fn new(segments: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let segments = segments.into_iter().filter(|s| !s.is_empty()).collect();
        Self {
            segments,
            index: 0,
            offset: 0,
        }
    }

    /// Bytes left across all segments.
    pub fn remaining(&self) -> usize {
        self.segments
            .iter()
            .skip(self.index)
            .map(|s| s.len())
            .sum::<usize>()
            - self.offset
    }

    fn current(&self) -> Option<&'a [u8]> {
        self.segments
            .get(self.index)
            .copied()
            .map(|s| &s[self.offset..])
    }

    fn advance(&mut self, mut len: usize) {
        while len > 0 {
            let Some(seg) = self.segments.get(self.index).copied() else {
                return;
            };
            let available = seg.len() - self.offset;
            if len < available {
                self.offset += len;
                return;
            }
            len -= available;
            self.index += 1;
            self.offset = 0;
        }
    }
}

impl<'a> ByteSource for SegmentedSource<'a> {
    fn peek_u8(&mut self) -> Result<u8, PackStreamError> {
        self.current()
            .and_then(|s| s.first().copied())
            .ok_or(PackStreamError::UnexpectedEof)
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        let byte = self.peek_u8()?;
        self.advance(1);
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> Result<Cow<'_, [u8]>, PackStreamError> {
        if len == 0 {
            return Ok(Cow::Borrowed(&[]));
        }
        if self.remaining() < len {
            return Err(PackStreamError::UnexpectedEof);
        }
        if let Some(seg) = self.current() {
            if seg.len() >= len {
                self.advance(len);
                return Ok(Cow::Borrowed(&seg[..len]));
            }
        }

        let mut gathered = Vec::with_capacity(len);
        while gathered.len() < len {
            let seg = self.current().ok_or(PackStreamError::UnexpectedEof)?;
            let take = seg.len().min(len - gathered.len());
            gathered.extend_from_slice(&seg[..take]);
            self.advance(take);
        }
        Ok(Cow::Owned(gathered))
    }
}

/// A blocking reader with one byte of lookahead.
#[derive(Debug)]
pub struct StreamSource<R> {
    reader: R,
    peeked: Option<u8>,
}

impl<R: Read> StreamSource<R> {
    /// Wrap `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
        }
    }

    /// Return the inner reader. A peeked byte that was not consumed is lost.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), PackStreamError> {
        self.reader.read_exact(buf).map_err(io_to_packstream)
    }
}

fn io_to_packstream(err: std::io::Error) -> PackStreamError {
    match err.kind() {
        ErrorKind::UnexpectedEof => PackStreamError::UnexpectedEof,
        _ => PackStreamError::Io(err.to_string()),
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn peek_u8(&mut self) -> Result<u8, PackStreamError> {
        if let Some(byte) = self.peeked {
            return Ok(byte);
        }
        let mut one = [0u8; 1];
        self.fill(&mut one)?;
        self.peeked = Some(one[0]);
        Ok(one[0])
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        let byte = self.peek_u8()?;
        self.peeked = None;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> Result<Cow<'_, [u8]>, PackStreamError> {
        let mut out = Vec::with_capacity(len.min(64 * 1024));
        let mut wanted = len;
        if wanted > 0 {
            if let Some(byte) = self.peeked.take() {
                out.push(byte);
                wanted -= 1;
            }
        }
        // Grow as bytes arrive so a bogus length cannot force a huge allocation.
        let read = (&mut self.reader)
            .take(wanted as u64)
            .read_to_end(&mut out)
            .map_err(io_to_packstream)?;
        if read < wanted {
            return Err(PackStreamError::UnexpectedEof);
        }
        Ok(Cow::Owned(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_slice_source_peek_does_not_consume() {
        let mut src = SliceSource::new(&[1, 2, 3]);
        assert_eq!(src.peek_u8().unwrap(), 1);
        assert_eq!(src.peek_u8().unwrap(), 1);
        assert_eq!(src.read_u8().unwrap(), 1);
        assert_eq!(&*src.read_exact(2).unwrap(), &[2, 3]);
        assert_eq!(src.read_u8(), Err(PackStreamError::UnexpectedEof));
    }

    #[test]
    fn test_segmented_source_borrows_within_a_segment() {
        let a = [1u8, 2, 3];
        let b = [4u8, 5];
        let mut src = SegmentedSource::new([&a[..], &b[..]]);
        assert!(matches!(src.read_exact(2).unwrap(), Cow::Borrowed(_)));
        assert_eq!(src.remaining(), 3);
    }

    #[test]
    fn test_segmented_source_copies_across_boundary() {
        let a = [1u8, 2, 3];
        let b = [4u8, 5];
        let mut src = SegmentedSource::new([&a[..], &b[..]]);
        assert_eq!(src.read_u8().unwrap(), 1);
        let joined = src.read_exact(3).unwrap();
        assert!(matches!(joined, Cow::Owned(_)));
        assert_eq!(&*joined, &[2, 3, 4]);
        assert_eq!(src.peek_u8().unwrap(), 5);
        assert_eq!(src.read_exact(2), Err(PackStreamError::UnexpectedEof));
    }

    #[test]
    fn test_segmented_source_skips_empty_segments() {
        let a = [9u8];
        let mut src = SegmentedSource::new([&[][..], &a[..], &[][..]]);
        assert_eq!(src.read_u8().unwrap(), 9);
        assert_eq!(src.peek_u8(), Err(PackStreamError::UnexpectedEof));
    }

    #[test]
    fn test_stream_source_peek_then_read_exact() {
        let mut src = StreamSource::new(Cursor::new(vec![7u8, 8, 9]));
        assert_eq!(src.peek_u8().unwrap(), 7);
        assert_eq!(&*src.read_exact(3).unwrap(), &[7, 8, 9]);
        assert_eq!(src.read_u8(), Err(PackStreamError::UnexpectedEof));
    }

    #[test]
    fn test_stream_source_short_read_is_eof() {
        let mut src = StreamSource::new(Cursor::new(vec![1u8, 2]));
        assert_eq!(src.read_exact(4), Err(PackStreamError::UnexpectedEof));
    }

    #[test]
    fn test_read_array() {
        let mut src = SliceSource::new(&[0x00, 0x82, 0xFF]);
        assert_eq!(src.read_array::<2>().unwrap(), [0x00, 0x82]);
        assert_eq!(src.read_array::<2>(), Err(PackStreamError::UnexpectedEof));
    }
}
