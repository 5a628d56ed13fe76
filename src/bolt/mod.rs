//! # Bolt Protocol Implementation
//!
//! Client-side Bolt protocol engine for communication with Bolt-compatible
//! graph databases.
//!
//! ## Overview
//!
//! A request travels down the layers and its responses travel back up:
//!
//! - **Protocol** - picks the requests and handlers for a logical operation
//! - **Message** - renders requests and parses responses for a version
//! - **PackStream** - binary serialization of every value
//! - **Chunk** - frames messages into length-prefixed chunks
//! - **Pipeline** - hands each response to the request it answers, in order
//!
//! [`Connection`] ties the framer, the message format and the pipeline to
//! one stream. [`BoltProtocol`] drives it.
//!
//! ## Protocol Versions
//!
//! 3.0, 4.0 to 4.4 and 5.0 to 5.2 are supported:
//!
//! - 4.0 adds databases and batched PULL
//! - 4.3 adds the ROUTE message, 4.4 impersonation
//! - 5.0 adds element ids, 5.1 LOGON, 5.2 notification filters
//!
//! ## Submodules
//!
//! - [`packstream`] - Binary serialization/deserialization
//! - [`chunk`] - Message framing
//! - [`message`] - Bolt message types (HELLO, RUN, PULL, etc.)
//! - [`handshake`] - Version negotiation
//! - [`pipeline`] - Response handlers and their FIFO queue
//! - [`protocol`] - Per-version operations
//! - [`connection`] - A framed connection over any async stream
//! - [`result`] - Streaming query results
//! - [`config`] - Connection settings
//! - [`error`] - Protocol error types

pub mod chunk;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;
pub mod pipeline;
pub mod protocol;
pub mod result;

pub use chunk::{ChunkCodec, ChunkReader, ChunkWriter};
pub use config::{BufferSettings, ConnectionConfig, ConnectionConfigBuilder, DEFAULT_FETCH_SIZE};
pub use connection::Connection;
pub use error::{BoltError, BoltResult, VersionError};
pub use handshake::{ProtocolVersion, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};
pub use message::{
    AccessMode, AuthToken, BeginMessage, BoltRequest, BoltResponse, HelloMessage, LogonMessage,
    MessageFormat, Notification, NotificationSeverity, NotificationsConfig, PullMessage,
    QueryStats, RecordMessage, RouteMessage, RoutingTable, RunMessage, ServerFailure,
    SuccessMessage, TransactionExtra, FETCH_ALL, NO_QID,
};
pub use packstream::{
    PackStreamDecoder, PackStreamEncoder, PackStreamError, PackStreamNode,
    PackStreamRelationship, PackStreamStructure, PackStreamValue, StructTable,
};
pub use pipeline::{BookmarksTracker, ResponseHandler, ResponsePipeline, ServerInfo};
pub use protocol::{AutoCommitParams, BoltProtocol, BoltProtocolV3, BoltProtocolV4, BoltProtocolV5};
pub use result::{Record, ResultStream, ResultSummary};
