//! # Zeta4G Bolt
//!
//! Client-side engine for the Bolt protocol spoken by
//! [Zeta4G](https://github.com/zeta9044/zeta4g) and other Bolt-compatible
//! graph databases.
//!
//! ## Features
//!
//! - **PackStream** - Compact binary encoding with three decoding strategies
//! - **Chunking** - Message framing with bounded, self-shrinking buffers
//! - **Version Dispatch** - Bolt 3.0, 4.0-4.4 and 5.0-5.2 from one API
//! - **Pipelining** - Many requests in flight, answered strictly in order
//! - **Async/Await** - Runs over any Tokio `AsyncRead + AsyncWrite` stream
//!
//! The crate does not open sockets, pool connections or retry. Hand it a
//! connected stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zeta4g_bolt::{AuthToken, AutoCommitParams, BoltProtocol, Connection, ConnectionConfig};
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = TcpStream::connect("localhost:7687").await?;
//!     let config = ConnectionConfig::builder()
//!         .with_user_agent("my-app/1.0")
//!         .build();
//!
//!     // Handshake, then pick the operations of the negotiated version
//!     let mut conn = Connection::connect(stream, config).await?;
//!     let protocol = BoltProtocol::for_connection(&conn)?;
//!     protocol
//!         .login(&mut conn, "my-app/1.0", AuthToken::basic("zeta4g", "password"), None)
//!         .await?;
//!
//!     // Run a query and stream its records
//!     let result = protocol
//!         .run_auto_commit(&mut conn, AutoCommitParams::new("UNWIND range(1, 3) AS n RETURN n"))
//!         .await?;
//!     while let Some(record) = result.next_record(&mut conn).await? {
//!         println!("{:?}", record.get("n"));
//!     }
//!
//!     protocol.logout(&mut conn).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```rust,no_run
//! # use zeta4g_bolt::{BoltProtocol, BookmarksTracker, Connection, TransactionExtra};
//! # use std::collections::HashMap;
//! # async fn example(
//! #     protocol: BoltProtocol,
//! #     conn: &mut Connection<tokio::net::TcpStream>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let bookmarks = BookmarksTracker::new();
//! let extra = TransactionExtra {
//!     database: Some("zeta4g".to_string()),
//!     ..Default::default()
//! };
//! protocol.begin_transaction(conn, extra).await?;
//!
//! let result = protocol
//!     .run_explicit(conn, "CREATE (n:Node {id: 1})", HashMap::new(), false, 1000)
//!     .await?;
//! result.collect(conn).await?;
//!
//! // Commit (or rollback on error)
//! protocol.commit_transaction(conn, &bookmarks).await?;
//! println!("bookmark: {:?}", bookmarks.get());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`BoltResult`]. Usage errors are raised before
//! anything is written; server failures leave the connection usable once
//! it is reset; everything else closes it:
//!
//! ```rust,no_run
//! # use zeta4g_bolt::{BoltError, BoltProtocol, Connection};
//! # async fn example(
//! #     protocol: BoltProtocol,
//! #     conn: &mut Connection<tokio::net::TcpStream>,
//! #     err: BoltError,
//! # ) -> Result<(), BoltError> {
//! match err {
//!     BoltError::Client(msg) => eprintln!("Bad request: {}", msg),
//!     BoltError::Server(failure) => {
//!         eprintln!("Server said {}", failure);
//!         protocol.reset(conn).await?;
//!     }
//!     e => eprintln!("Connection lost: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`bolt`] - The protocol implementation
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;

// Re-exports for convenience
pub use bolt::{
    AccessMode, AuthToken, AutoCommitParams, BoltError, BoltProtocol, BoltResult,
    BookmarksTracker, BufferSettings, Connection, ConnectionConfig, ConnectionConfigBuilder,
    NotificationsConfig, PackStreamValue, ProtocolVersion, Record, ResultStream, ResultSummary,
    ServerFailure, ServerInfo, TransactionExtra, VersionError,
};

/// Config alias for convenience
pub type Config = ConnectionConfig;
