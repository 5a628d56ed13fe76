//! Version dispatch.
//!
//! Each negotiated version knows which requests make up a logical
//! operation and which handler answers each of them. The versions form a
//! closed set: [`BoltProtocol`] has one variant per major line and every
//! operation is a `match` over it. Newer lines hold the older one and
//! delegate the flows that did not change, so capability checks always see
//! the version actually negotiated.
//!
//! Capability mismatches (a database on 3.0, impersonation before 4.4,
//! notification filters before 5.2) are [`BoltError::Client`] errors raised
//! before anything is written; the connection stays usable.
//!
//! [`BoltError::Client`]: crate::bolt::error::BoltError::Client

mod routing;
mod v3;
mod v4;
mod v5;

pub use v3::BoltProtocolV3;
pub use v4::BoltProtocolV4;
pub use v5::BoltProtocolV5;

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::bolt::config::DEFAULT_FETCH_SIZE;
use crate::bolt::connection::Connection;
use crate::bolt::error::{BoltResult, VersionError};
use crate::bolt::handshake::ProtocolVersion;
use crate::bolt::message::{AuthToken, NotificationsConfig, TransactionExtra};
use crate::bolt::packstream::PackStreamValue;
use crate::bolt::pipeline::BookmarksTracker;
use crate::bolt::result::ResultStream;

/// A query run outside an explicit transaction.
#[derive(Debug, Clone)]
pub struct AutoCommitParams {
    /// Query text
    pub query: String,
    /// Query parameters
    pub parameters: HashMap<String, PackStreamValue>,
    /// Bookmarks, timeout, metadata, mode, database and impersonation
    pub extra: TransactionExtra,
    /// Receives the bookmark once the result is fully consumed
    pub bookmarks: Option<BookmarksTracker>,
    /// Leave PULL to explicit [`BoltProtocol::request_more`] calls
    pub reactive: bool,
    /// Records per PULL
    pub fetch_size: i64,
}

impl AutoCommitParams {
    /// Parameters for `query` with defaults everywhere else.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: HashMap::new(),
            extra: TransactionExtra::default(),
            bookmarks: None,
            reactive: false,
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }

    /// Set the query parameters.
    pub fn with_parameters(mut self, parameters: HashMap<String, PackStreamValue>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the transaction settings.
    pub fn with_extra(mut self, extra: TransactionExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Track the resulting bookmark in `tracker`.
    pub fn with_bookmarks(mut self, tracker: BookmarksTracker) -> Self {
        self.bookmarks = Some(tracker);
        self
    }

    /// Make the result reactive.
    pub fn with_reactive(mut self, reactive: bool) -> Self {
        self.reactive = reactive;
        self
    }

    /// Set the fetch size.
    pub fn with_fetch_size(mut self, fetch_size: i64) -> Self {
        self.fetch_size = fetch_size;
        self
    }
}

/// `None` for a missing, empty or whitespace-only name.
pub(crate) fn blank_to_none(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.trim().is_empty())
}

/// The operations of one negotiated protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoltProtocol {
    /// 3.0
    V3(BoltProtocolV3),
    /// 4.0 to 4.4
    V4(BoltProtocolV4),
    /// 5.0 to 5.2
    V5(BoltProtocolV5),
}

impl BoltProtocol {
    /// Select the operations for `version`.
    pub fn for_version(version: ProtocolVersion) -> Result<Self, VersionError> {
        if version == ProtocolVersion::ZERO {
            return Err(VersionError::NoCompatibleVersion);
        }
        if !version.is_supported() {
            return Err(VersionError::Unsupported(version));
        }
        debug!("Selected Bolt protocol {}", version);
        Ok(match version.major() {
            3 => BoltProtocol::V3(BoltProtocolV3::new(version)),
            4 => BoltProtocol::V4(BoltProtocolV4::new(version)),
            _ => BoltProtocol::V5(BoltProtocolV5::new(version)),
        })
    }

    /// Select the operations for a server's raw handshake answer.
    pub fn for_raw(raw: u32) -> Result<Self, VersionError> {
        Self::for_version(ProtocolVersion::from_packed(raw)?)
    }

    /// Select the operations for the version `conn` negotiated.
    pub fn for_connection<S>(conn: &Connection<S>) -> Result<Self, VersionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        Self::for_version(conn.version())
    }

    /// The version these operations speak.
    pub fn version(&self) -> ProtocolVersion {
        match self {
            BoltProtocol::V3(p) => p.version(),
            BoltProtocol::V4(p) => p.version(),
            BoltProtocol::V5(p) => p.version(),
        }
    }

    /// Initialise and authenticate the connection.
    pub async fn login<S>(
        &self,
        conn: &mut Connection<S>,
        user_agent: &str,
        auth: AuthToken,
        notifications: Option<NotificationsConfig>,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.login(conn, user_agent, auth, notifications).await,
            BoltProtocol::V4(p) => p.login(conn, user_agent, auth, notifications).await,
            BoltProtocol::V5(p) => p.login(conn, user_agent, auth, notifications).await,
        }
    }

    /// Send GOODBYE and close the connection.
    pub async fn logout<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.logout(conn).await,
            BoltProtocol::V4(p) => p.logout(conn).await,
            BoltProtocol::V5(p) => p.logout(conn).await,
        }
    }

    /// Return the connection to a clean state, clearing a stored failure.
    pub async fn reset<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.reset(conn).await,
            BoltProtocol::V4(p) => p.reset(conn).await,
            BoltProtocol::V5(p) => p.reset(conn).await,
        }
    }

    /// Open an explicit transaction.
    pub async fn begin_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        extra: TransactionExtra,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.begin_transaction(conn, extra).await,
            BoltProtocol::V4(p) => p.begin_transaction(conn, extra).await,
            BoltProtocol::V5(p) => p.begin_transaction(conn, extra).await,
        }
    }

    /// Commit the open transaction and record its bookmark.
    pub async fn commit_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        bookmarks: &BookmarksTracker,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.commit_transaction(conn, bookmarks).await,
            BoltProtocol::V4(p) => p.commit_transaction(conn, bookmarks).await,
            BoltProtocol::V5(p) => p.commit_transaction(conn, bookmarks).await,
        }
    }

    /// Roll the open transaction back.
    pub async fn rollback_transaction<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.rollback_transaction(conn).await,
            BoltProtocol::V4(p) => p.rollback_transaction(conn).await,
            BoltProtocol::V5(p) => p.rollback_transaction(conn).await,
        }
    }

    /// Run a query in its own transaction. The requests are flushed but no
    /// response is read; records arrive through the returned stream.
    pub async fn run_auto_commit<S>(
        &self,
        conn: &mut Connection<S>,
        params: AutoCommitParams,
    ) -> BoltResult<ResultStream>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.run_auto_commit(conn, params).await,
            BoltProtocol::V4(p) => p.run_auto_commit(conn, params).await,
            BoltProtocol::V5(p) => p.run_auto_commit(conn, params).await,
        }
    }

    /// Run a query inside the open transaction.
    pub async fn run_explicit<S>(
        &self,
        conn: &mut Connection<S>,
        query: &str,
        parameters: HashMap<String, PackStreamValue>,
        reactive: bool,
        fetch_size: i64,
    ) -> BoltResult<ResultStream>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.run_explicit(conn, query, parameters).await,
            BoltProtocol::V4(p) => {
                p.run_explicit(conn, query, parameters, reactive, fetch_size)
                    .await
            }
            BoltProtocol::V5(p) => {
                p.run_explicit(conn, query, parameters, reactive, fetch_size)
                    .await
            }
        }
    }

    /// Fetch the routing table for `database`, or the home database when
    /// `None` or blank. The returned map always holds `db`.
    ///
    /// Any failure once the request has been flushed closes `conn`.
    pub async fn get_routing_table<S>(
        &self,
        conn: &mut Connection<S>,
        database: Option<&str>,
        impersonated_user: Option<&str>,
        bookmarks: &[String],
    ) -> BoltResult<HashMap<String, PackStreamValue>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => {
                p.get_routing_table(conn, database, impersonated_user, bookmarks)
                    .await
            }
            BoltProtocol::V4(p) => {
                p.get_routing_table(conn, database, impersonated_user, bookmarks)
                    .await
            }
            BoltProtocol::V5(p) => {
                p.get_routing_table(conn, database, impersonated_user, bookmarks)
                    .await
            }
        }
    }

    /// Ask for `n` more records of `stream`.
    pub async fn request_more<S>(
        &self,
        conn: &mut Connection<S>,
        stream: &ResultStream,
        n: i64,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.request_more(conn, stream, n).await,
            BoltProtocol::V4(p) => p.request_more(conn, stream, n).await,
            BoltProtocol::V5(p) => p.request_more(conn, stream, n).await,
        }
    }

    /// Discard the remaining records of `stream`.
    pub async fn cancel<S>(&self, conn: &mut Connection<S>, stream: &ResultStream) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            BoltProtocol::V3(p) => p.cancel(conn, stream).await,
            BoltProtocol::V4(p) => p.cancel(conn, stream).await,
            BoltProtocol::V5(p) => p.cancel(conn, stream).await,
        }
    }
}
