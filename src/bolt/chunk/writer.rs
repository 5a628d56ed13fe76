//! Outbound chunk framing.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, trace};

use super::{hex, CHUNK_HEADER_SIZE, END_MARKER, MAX_CHUNK_SIZE};
use crate::bolt::config::BufferSettings;
use crate::bolt::error::{BoltError, BoltResult};

/// Frames messages into a write buffer and flushes them to a stream.
///
/// Several messages may be queued before one [`send`](Self::send), which is
/// how requests are pipelined.
#[derive(Debug)]
pub struct ChunkWriter {
    buf: BytesMut,
    chunk_size: usize,
    /// Offset of the open chunk's length placeholder
    chunk_start: Option<usize>,
    default_size: usize,
    max_size: usize,
    shrink_count: u64,
}

impl ChunkWriter {
    /// Create a writer sized by `settings`.
    pub fn new(settings: &BufferSettings) -> Self {
        Self {
            buf: BytesMut::with_capacity(settings.default_write_buffer_size),
            chunk_size: MAX_CHUNK_SIZE,
            chunk_start: None,
            default_size: settings.default_write_buffer_size,
            max_size: settings.max_write_buffer_size.max(settings.default_write_buffer_size),
            shrink_count: 0,
        }
    }

    /// Split payloads into chunks of at most `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Frame one message.
    ///
    /// An empty payload is rejected: on the wire it would be a bare end
    /// marker, which the peer reads as a NOOP.
    pub fn write_message(&mut self, payload: &[u8]) -> BoltResult<()> {
        if payload.is_empty() {
            return Err(BoltError::client("Cannot frame an empty message"));
        }
        self.open_chunk();
        let mut rest = payload;
        while !rest.is_empty() {
            let room = self.chunk_size - self.open_chunk_len();
            if room == 0 {
                self.close_chunk();
                self.open_chunk();
                continue;
            }
            let n = room.min(rest.len());
            self.buf.put_slice(&rest[..n]);
            rest = &rest[n..];
        }
        self.close_chunk();
        self.buf.put_slice(&END_MARKER);
        Ok(())
    }

    /// Bytes queued and not yet sent.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of times the buffer has been shrunk back to its default size.
    pub fn shrink_count(&self) -> u64 {
        self.shrink_count
    }

    /// Write everything queued to `stream` and flush it.
    pub async fn send<S>(&mut self, stream: &mut S) -> BoltResult<()>
    where
        S: AsyncWrite + Unpin,
    {
        if !self.buf.is_empty() {
            trace!("C: {}", hex(&self.buf));
            stream.write_all(&self.buf).await?;
        }
        stream.flush().await?;
        self.cleanup();
        Ok(())
    }

    fn cleanup(&mut self) {
        self.buf.clear();
        if self.buf.capacity() > self.max_size {
            self.buf = BytesMut::with_capacity(self.default_size);
            self.shrink_count += 1;
            info!(
                "Shrunk write buffer to {} bytes (shrink count {})",
                self.default_size, self.shrink_count
            );
        }
    }

    fn open_chunk(&mut self) {
        self.chunk_start = Some(self.buf.len());
        self.buf.put_slice(&[0x00, 0x00]);
    }

    fn open_chunk_len(&self) -> usize {
        self.chunk_start
            .map(|start| self.buf.len() - start - CHUNK_HEADER_SIZE)
            .unwrap_or(0)
    }

    /// Back-patch the open chunk's length, dropping the chunk if it is empty.
    fn close_chunk(&mut self) {
        if let Some(start) = self.chunk_start.take() {
            let len = self.buf.len() - start - CHUNK_HEADER_SIZE;
            if len == 0 {
                self.buf.truncate(start);
            } else {
                self.buf[start..start + CHUNK_HEADER_SIZE]
                    .copy_from_slice(&(len as u16).to_be_bytes());
            }
        }
    }
}
