//! Inbound chunk reassembly.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use super::buffer::ReadBuffer;
use super::{ChunkScanner, Scan, CHUNK_HEADER_SIZE};
use crate::bolt::config::BufferSettings;
use crate::bolt::error::{BoltError, BoltResult};

/// Reassembles chunked messages from a stream.
///
/// Bytes are read into an arena and only pulled from the stream when the
/// buffered bytes cannot complete the next message, so several pipelined
/// responses arriving in one read are drained without further I/O.
///
/// After a read timeout or an I/O error the reader is defunct and every
/// later read fails with [`BoltError::ConnectionClosed`].
#[derive(Debug)]
pub struct ChunkReader {
    buffer: ReadBuffer,
    scanner: ChunkScanner,
    scratch: BytesMut,
    read_timeout: Option<Duration>,
    defunct: bool,
}

impl ChunkReader {
    /// Create a reader sized by `settings`.
    pub fn new(settings: &BufferSettings, read_timeout: Option<Duration>) -> Self {
        Self {
            buffer: ReadBuffer::new(
                settings.default_read_buffer_size,
                settings.max_read_buffer_size,
            ),
            scanner: ChunkScanner::new(),
            scratch: BytesMut::new(),
            read_timeout,
            defunct: false,
        }
    }

    /// Whether a timeout or I/O error has killed this reader.
    pub fn is_defunct(&self) -> bool {
        self.defunct
    }

    /// Number of unread bytes already buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of times the read buffer has been shrunk back to its default
    /// size.
    pub fn shrink_count(&self) -> u64 {
        self.buffer.shrink_count()
    }

    /// Read the next message and hand its payload to `decode`.
    ///
    /// NOOP chunks are skipped. A message held in one chunk is decoded in
    /// place. A message split over several chunks is joined into a scratch
    /// buffer first.
    ///
    /// End of stream inside a chunk is an `UnexpectedEof` I/O error. End of
    /// stream on a message boundary, with nothing buffered, is
    /// [`BoltError::ConnectionClosed`].
    pub async fn read_message<S, T, F>(&mut self, stream: &mut S, decode: F) -> BoltResult<T>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: FnOnce(&[u8]) -> BoltResult<T>,
    {
        loop {
            if let Some(end) = self.next_boundary(stream).await? {
                return self.decode_message(end, decode);
            }
        }
    }

    /// Like [`read_message`](Self::read_message), but stops at a NOOP that
    /// drains the buffer and returns `Ok(None)`: the stream sat on a message
    /// boundary with no message data.
    pub async fn try_read_message<S, T, F>(
        &mut self,
        stream: &mut S,
        decode: F,
    ) -> BoltResult<Option<T>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: FnOnce(&[u8]) -> BoltResult<T>,
    {
        match self.next_boundary(stream).await? {
            Some(end) => self.decode_message(end, decode).map(Some),
            None => Ok(None),
        }
    }

    /// Scan until a message is complete and return the offset past its end
    /// marker. `None` when a NOOP left nothing buffered.
    async fn next_boundary<S>(&mut self, stream: &mut S) -> BoltResult<Option<usize>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.defunct {
            return Err(BoltError::ConnectionClosed);
        }

        loop {
            match self.scanner.scan(self.buffer.readable()) {
                Scan::Noop => {
                    trace!("S: <NOOP>");
                    self.buffer.advance(CHUNK_HEADER_SIZE);
                    if self.buffer.len() == 0 {
                        return Ok(None);
                    }
                }
                Scan::Incomplete { needed } => self.fill(stream, needed).await?,
                Scan::Complete { end } => return Ok(Some(end)),
            }
        }
    }

    fn decode_message<T, F>(&mut self, end: usize, decode: F) -> BoltResult<T>
    where
        F: FnOnce(&[u8]) -> BoltResult<T>,
    {
        let data = self.buffer.readable();
        let result = match self.scanner.spans() {
            [span] => decode(&data[span.clone()]),
            spans => {
                self.scratch.clear();
                for span in spans {
                    self.scratch.extend_from_slice(&data[span.clone()]);
                }
                decode(&self.scratch)
            }
        };
        self.buffer.advance(end);
        result
    }

    /// Read until at least `needed` bytes are buffered.
    async fn fill<S>(&mut self, stream: &mut S, needed: usize) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        while self.buffer.len() < needed {
            self.buffer.reserve(needed);
            let read = match self.read_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.buffer.fill_from(stream)).await {
                        Ok(read) => read,
                        Err(_) => {
                            self.defunct = true;
                            warn!("No data received within {:?}, closing connection", limit);
                            if let Err(e) = stream.shutdown().await {
                                debug!("Shutdown after read timeout failed: {}", e);
                            }
                            return Err(BoltError::ReadTimeout(limit));
                        }
                    }
                }
                None => self.buffer.fill_from(stream).await,
            };

            match read {
                Ok(0) => {
                    self.defunct = true;
                    if self.buffer.len() == 0 && self.scanner.at_message_start() {
                        debug!("Stream ended on a message boundary");
                        return Err(BoltError::ConnectionClosed);
                    }
                    return Err(BoltError::unexpected_eof());
                }
                Ok(_) => {}
                Err(e) => {
                    self.defunct = true;
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::chunk::ChunkWriter;
    use std::io;

    fn reader() -> ChunkReader {
        ChunkReader::new(&BufferSettings::default(), None)
    }

    fn to_vec(payload: &[u8]) -> BoltResult<Vec<u8>> {
        Ok(payload.to_vec())
    }

    #[tokio::test]
    async fn test_read_single_chunk() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x00, 0x03, 0xB1, 0x70, 0xA0, 0x00, 0x00])
            .build();
        let payload = reader().read_message(&mut stream, to_vec).await.unwrap();
        assert_eq!(payload, vec![0xB1, 0x70, 0xA0]);
    }

    #[tokio::test]
    async fn test_read_across_short_reads() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x00])
            .read(&[0x03, 0xB1])
            .read(&[0x70])
            .read(&[0xA0, 0x00])
            .read(&[0x00])
            .build();
        let payload = reader().read_message(&mut stream, to_vec).await.unwrap();
        assert_eq!(payload, vec![0xB1, 0x70, 0xA0]);
    }

    #[tokio::test]
    async fn test_multi_chunk_matches_single_chunk() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        let mut split = ChunkWriter::new(&BufferSettings::default()).with_chunk_size(7);
        split.write_message(&payload).unwrap();
        let mut stream = tokio_test::io::Builder::new().read(split.pending()).build();
        let from_split = reader().read_message(&mut stream, to_vec).await.unwrap();

        let mut whole = ChunkWriter::new(&BufferSettings::default());
        whole.write_message(&payload).unwrap();
        let mut stream = tokio_test::io::Builder::new().read(whole.pending()).build();
        let from_whole = reader().read_message(&mut stream, to_vec).await.unwrap();

        assert_eq!(from_split, payload);
        assert_eq!(from_whole, payload);
    }

    #[tokio::test]
    async fn test_noop_is_skipped() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x00, 0x00, 0x00, 0x00])
            .read(&[0x00, 0x01, 0xC0, 0x00, 0x00])
            .build();
        let payload = reader().read_message(&mut stream, to_vec).await.unwrap();
        assert_eq!(payload, vec![0xC0]);
    }

    #[tokio::test]
    async fn test_pipelined_messages_drain_from_buffer() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00])
            .build();
        let mut r = reader();
        assert_eq!(r.read_message(&mut stream, to_vec).await.unwrap(), vec![0x01]);
        assert_eq!(r.buffered(), 5);
        assert_eq!(r.read_message(&mut stream, to_vec).await.unwrap(), vec![0x02]);
        assert_eq!(r.buffered(), 0);
    }

    #[tokio::test]
    async fn test_eof_mid_chunk() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x00, 0x05, 0x01, 0x02])
            .build();
        let mut r = reader();
        let err = r.read_message(&mut stream, to_vec).await.unwrap_err();
        match err {
            BoltError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {:?}", other),
        }
        assert!(r.is_defunct());
        assert!(matches!(
            r.read_message(&mut stream, to_vec).await,
            Err(BoltError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_noop_then_eof_is_a_boundary() {
        let mut stream = tokio_test::io::Builder::new().read(&[0x00, 0x00]).build();
        let mut r = reader();
        assert_eq!(r.try_read_message(&mut stream, to_vec).await.unwrap(), None);
        assert!(!r.is_defunct());

        assert!(matches!(
            r.read_message(&mut stream, to_vec).await,
            Err(BoltError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_truncated_chunk_is_not_a_boundary() {
        let mut stream = tokio_test::io::Builder::new().read(&[0x00, 0x05, 0x01]).build();
        let err = reader().try_read_message(&mut stream, to_vec).await.unwrap_err();
        match err {
            BoltError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_try_read_skips_noop_before_message() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x00, 0x00, 0x00, 0x01, 0xC0, 0x00, 0x00])
            .build();
        let payload = reader().try_read_message(&mut stream, to_vec).await.unwrap();
        assert_eq!(payload, Some(vec![0xC0]));
    }

    #[tokio::test]
    async fn test_read_timeout_closes() {
        let (mut client, _server) = tokio::io::duplex(64);
        let mut r = ChunkReader::new(&BufferSettings::default(), Some(Duration::from_millis(20)));
        let err = r.read_message(&mut client, to_vec).await.unwrap_err();
        assert!(matches!(err, BoltError::ReadTimeout(_)));
        assert!(r.is_defunct());
    }

    #[tokio::test]
    async fn test_decode_error_is_returned() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x00, 0x01, 0xC0, 0x00, 0x00])
            .build();
        let err = reader()
            .read_message(&mut stream, |_| -> BoltResult<()> { Err(BoltError::protocol("bad")) })
            .await
            .unwrap_err();
        assert!(matches!(err, BoltError::Protocol(_)));
    }
}
