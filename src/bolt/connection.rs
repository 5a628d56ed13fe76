//! A Bolt connection over an arbitrary byte stream.
//!
//! The connection owns the framer, the message format of the negotiated
//! version and the response pipeline. It does not know which requests make
//! up an operation; that is the job of [`crate::bolt::protocol`].

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::bolt::chunk::{ChunkReader, ChunkWriter};
use crate::bolt::config::ConnectionConfig;
use crate::bolt::error::{BoltError, BoltResult};
use crate::bolt::handshake::{perform_handshake, ProtocolVersion};
use crate::bolt::message::{BoltRequest, BoltResponse, MessageFormat};
use crate::bolt::packstream::PackStreamEncoder;
use crate::bolt::pipeline::{ResponseHandler, ResponsePipeline, ServerInfo};

/// A Bolt connection.
///
/// Requests are written with [`enqueue`](Self::enqueue), flushed with
/// [`send`](Self::send) and answered by [`receive_all`](Self::receive_all).
/// [`sync`](Self::sync) does both. All methods take `&mut self`, so one
/// request/response cycle runs at a time.
///
/// A fatal error (I/O, timeout, malformed data, protocol violation) closes
/// the connection; every later call fails with
/// [`BoltError::ConnectionClosed`].
pub struct Connection<S> {
    stream: S,
    format: MessageFormat,
    encoder: PackStreamEncoder,
    writer: ChunkWriter,
    reader: ChunkReader,
    pipeline: ResponsePipeline,
    config: ConnectionConfig,
    server_info: Arc<Mutex<ServerInfo>>,
    open: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Negotiate a version over `stream` and wrap it.
    pub async fn connect(mut stream: S, config: ConnectionConfig) -> BoltResult<Self> {
        let version = perform_handshake(&mut stream, config.read_timeout).await?;
        Ok(Self::new(stream, version, config))
    }

    /// Wrap a stream whose version has already been negotiated.
    pub fn new(stream: S, version: ProtocolVersion, config: ConnectionConfig) -> Self {
        Self {
            stream,
            format: MessageFormat::for_version(version),
            encoder: PackStreamEncoder::new(),
            writer: ChunkWriter::new(&config.buffer_settings),
            reader: ChunkReader::new(&config.buffer_settings, config.read_timeout),
            pipeline: ResponsePipeline::new(),
            config,
            server_info: Arc::new(Mutex::new(ServerInfo::default())),
            open: true,
        }
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> ProtocolVersion {
        self.format.version()
    }

    /// Connection settings.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// What the server reported in answer to HELLO.
    pub fn server_info(&self) -> ServerInfo {
        self.server_info.lock().clone()
    }

    pub(crate) fn server_info_handle(&self) -> Arc<Mutex<ServerInfo>> {
        self.server_info.clone()
    }

    /// Whether the connection can still be used.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The response pipeline.
    pub fn pipeline(&self) -> &ResponsePipeline {
        &self.pipeline
    }

    /// The outbound framer.
    pub fn writer(&self) -> &ChunkWriter {
        &self.writer
    }

    /// The inbound framer.
    pub fn reader(&self) -> &ChunkReader {
        &self.reader
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Write `request` and register `handler` for its response. Nothing is
    /// sent until [`send`](Self::send).
    pub fn enqueue<H>(&mut self, request: BoltRequest, handler: H) -> BoltResult<()>
    where
        H: ResponseHandler + 'static,
    {
        self.write(&request)?;
        self.pipeline.enqueue(Box::new(handler));
        Ok(())
    }

    /// Write a request the server does not answer.
    pub fn write(&mut self, request: &BoltRequest) -> BoltResult<()> {
        if !self.open {
            return Err(BoltError::ConnectionClosed);
        }
        self.encoder.clear();
        self.format.write(request, &mut self.encoder)?;
        debug!("C: {}", request);
        self.writer.write_message(self.encoder.as_bytes())?;
        Ok(())
    }

    /// Flush every written request.
    pub async fn send(&mut self) -> BoltResult<()> {
        if !self.open {
            return Err(BoltError::ConnectionClosed);
        }
        match self.writer.send(&mut self.stream).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.terminate(e).await),
        }
    }

    /// Read and dispatch one response, if any request is pending.
    pub async fn receive_one(&mut self) -> BoltResult<()> {
        if self.pipeline.has_no_pending_messages() {
            return Ok(());
        }
        self.read_and_dispatch().await.map(|_| ())
    }

    /// Read responses until every pending request is answered or one fails.
    ///
    /// After a FAILURE the read cycle stops and the failure is returned.
    /// Responses to later requests stay unread until the caller resets.
    pub async fn receive_all(&mut self) -> BoltResult<()> {
        while !self.pipeline.has_no_pending_messages() {
            if self.read_and_dispatch().await? {
                break;
            }
        }
        if let Err(e) = self.pipeline.assert_no_protocol_violation() {
            return Err(self.terminate(e).await);
        }
        self.pipeline.assert_no_failure()
    }

    /// Flush, then read every response.
    pub async fn sync(&mut self) -> BoltResult<()> {
        self.send().await?;
        self.receive_all().await
    }

    /// Shut the stream down. Idempotent.
    pub async fn close(&mut self) -> BoltResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Returns whether the dispatched message was a FAILURE.
    async fn read_and_dispatch(&mut self) -> BoltResult<bool> {
        if !self.open {
            return Err(BoltError::ConnectionClosed);
        }
        let format = &self.format;
        let read = self
            .reader
            .read_message(&mut self.stream, |payload| format.read(payload))
            .await;
        let outcome = read.and_then(|response| {
            let failed = matches!(response, BoltResponse::Failure(_));
            self.pipeline.dispatch(response).map(|()| failed)
        });
        match outcome {
            Ok(failed) => Ok(failed),
            Err(e) => Err(self.terminate(e).await),
        }
    }

    /// Close the connection if `error` leaves it unusable, then hand the
    /// error back.
    async fn terminate(&mut self, error: BoltError) -> BoltError {
        if error.is_fatal() && self.open {
            warn!("Closing connection after fatal error: {}", error);
            self.open = false;
            if let Err(e) = self.stream.shutdown().await {
                debug!("Shutdown failed: {}", e);
            }
        }
        error
    }
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("version", &self.format.version())
            .field("open", &self.open)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
