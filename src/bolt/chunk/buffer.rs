//! Read arena for the chunk reader.

use std::io;
use std::mem;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::info;

use super::CHUNK_HEADER_SIZE;

/// Smallest free tail worth handing to a socket read.
const MIN_READ_SIZE: usize = 512;

/// Free tail below which buffered bytes are moved to the front.
const LOW_WATERMARK: usize = CHUNK_HEADER_SIZE + MIN_READ_SIZE;

/// Move the unread bytes `buf[read..write]` to the front of the buffer.
///
/// Returns the buffer with its new read and write cursors.
pub fn compact(mut buf: Vec<u8>, read: usize, write: usize) -> (Vec<u8>, usize, usize) {
    buf.copy_within(read..write, 0);
    (buf, 0, write - read)
}

/// A growable byte arena with a read cursor and a write cursor.
///
/// Invariant: `read <= write <= buf.len()`.
#[derive(Debug)]
pub(crate) struct ReadBuffer {
    buf: Vec<u8>,
    read: usize,
    write: usize,
    default_size: usize,
    max_size: usize,
    shrink_count: u64,
}

impl ReadBuffer {
    pub(crate) fn new(default_size: usize, max_size: usize) -> Self {
        let default_size = default_size.max(LOW_WATERMARK);
        Self {
            buf: vec![0; default_size],
            read: 0,
            write: 0,
            default_size,
            max_size: max_size.max(default_size),
            shrink_count: 0,
        }
    }

    /// Unread bytes.
    pub(crate) fn readable(&self) -> &[u8] {
        &self.buf[self.read..self.write]
    }

    /// Number of unread bytes.
    pub(crate) fn len(&self) -> usize {
        self.write - self.read
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn shrink_count(&self) -> u64 {
        self.shrink_count
    }

    /// Consume `n` unread bytes. A fully drained buffer is rewound and, if
    /// it grew past the maximum, shrunk back to the default size.
    pub(crate) fn advance(&mut self, n: usize) {
        self.read = (self.read + n).min(self.write);
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
            if self.buf.len() > self.max_size {
                self.buf = vec![0; self.default_size];
                self.shrink_count += 1;
                info!(
                    "Shrunk read buffer to {} bytes (shrink count {})",
                    self.default_size, self.shrink_count
                );
            }
        }
    }

    /// Make room for at least `needed` unread bytes and a useful read.
    pub(crate) fn reserve(&mut self, needed: usize) {
        let tail = self.buf.len() - self.write;
        if self.read > 0 && (tail < LOW_WATERMARK || self.read + needed > self.buf.len()) {
            let (buf, read, write) = compact(mem::take(&mut self.buf), self.read, self.write);
            self.buf = buf;
            self.read = read;
            self.write = write;
        }

        let target = (self.read + needed).max(self.write + LOW_WATERMARK);
        if target > self.buf.len() {
            let new_len = target.max(self.buf.len() * 2);
            self.buf.resize(new_len, 0);
        }
    }

    /// Read once from `stream` into the free tail. Returns the number of
    /// bytes read, zero at end of stream.
    pub(crate) async fn fill_from<S>(&mut self, stream: &mut S) -> io::Result<usize>
    where
        S: AsyncRead + Unpin,
    {
        let n = stream.read(&mut self.buf[self.write..]).await?;
        self.write += n;
        Ok(n)
    }
}
