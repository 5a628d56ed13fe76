//! Chunk framing as a `tokio_util` codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::{ChunkScanner, Scan, CHUNK_HEADER_SIZE, END_MARKER, MAX_CHUNK_SIZE};
use crate::bolt::error::BoltError;

/// Bolt chunk codec for framed transports.
///
/// Decoding yields the joined payload of each message, NOOPs skipped.
/// Encoding frames one payload per item.
#[derive(Debug)]
pub struct ChunkCodec {
    scanner: ChunkScanner,
    chunk_size: usize,
}

impl ChunkCodec {
    /// Create a codec that writes maximum-size chunks.
    pub fn new() -> Self {
        Self {
            scanner: ChunkScanner::new(),
            chunk_size: MAX_CHUNK_SIZE,
        }
    }

    /// Split outbound payloads into chunks of at most `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
        self
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.scanner.scan(&src[..]) {
                Scan::Incomplete { needed } => {
                    src.reserve(needed.saturating_sub(src.len()));
                    return Ok(None);
                }
                Scan::Noop => {
                    trace!("S: <NOOP>");
                    src.advance(CHUNK_HEADER_SIZE);
                }
                Scan::Complete { end } => {
                    let frame = src.split_to(end).freeze();
                    return Ok(Some(match self.scanner.spans() {
                        [span] => frame.slice(span.clone()),
                        spans => {
                            let mut joined = BytesMut::with_capacity(self.scanner.payload_len());
                            for span in spans {
                                joined.extend_from_slice(&frame[span.clone()]);
                            }
                            joined.freeze()
                        }
                    }));
                }
            }
        }
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = BoltError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.is_empty() {
            return Err(BoltError::client("Cannot frame an empty message"));
        }
        let chunks = item.len().div_ceil(self.chunk_size);
        dst.reserve(item.len() + CHUNK_HEADER_SIZE * (chunks + 1));
        for chunk in item.chunks(self.chunk_size) {
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
        }
        dst.put_slice(&END_MARKER);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test]
    fn test_decode_waits_for_end_marker() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x02, 0xB0][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x0F, 0x00]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x00, 0x00, 0x01]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&msg[..], &[0xB0, 0x0F]);
        assert_eq!(&buf[..], &[0x00, 0x01]);
    }

    #[test]
    fn test_decode_joins_chunks_and_skips_noop() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x01, 0xAA, 0x00, 0x01, 0xBB, 0x00, 0x00][..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&msg[..], &[0xAA, 0xBB]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_splits() {
        let mut codec = ChunkCodec::new().with_chunk_size(2);
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from_static(&[1, 2, 3]), &mut dst).unwrap();
        assert_eq!(&dst[..], &[0, 2, 1, 2, 0, 1, 3, 0, 0]);
    }

    #[test]
    fn test_encode_rejects_empty_payload() {
        let mut dst = BytesMut::new();
        let err = ChunkCodec::new().encode(Bytes::new(), &mut dst).unwrap_err();
        assert!(err.is_client_error());
        assert!(dst.is_empty());
    }

    #[tokio::test]
    async fn test_framed_round_trip() {
        let mut wire = Vec::new();
        {
            let mut sink = FramedWrite::new(&mut wire, ChunkCodec::new().with_chunk_size(3));
            sink.send(Bytes::from_static(b"hello bolt")).await.unwrap();
            sink.send(Bytes::from_static(b"x")).await.unwrap();
        }

        let mut frames = FramedRead::new(&wire[..], ChunkCodec::new());
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from_static(b"hello bolt"));
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from_static(b"x"));
        assert!(frames.next().await.is_none());
    }
}
