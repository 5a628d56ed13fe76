//! Bolt 5.x. From 5.1 authentication moves out of HELLO into LOGON.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};

use super::v4::BoltProtocolV4;
use super::AutoCommitParams;
use crate::bolt::connection::Connection;
use crate::bolt::error::BoltResult;
use crate::bolt::handshake::ProtocolVersion;
use crate::bolt::message::{
    AuthToken, BoltRequest, HelloMessage, LogonMessage, NotificationsConfig, TransactionExtra,
};
use crate::bolt::packstream::PackStreamValue;
use crate::bolt::pipeline::{BookmarksTracker, HelloHandler, LogonHandler};
use crate::bolt::result::ResultStream;

/// Bolt 5.0 through 5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoltProtocolV5 {
    v4: BoltProtocolV4,
}

impl BoltProtocolV5 {
    pub(crate) fn new(version: ProtocolVersion) -> Self {
        Self {
            v4: BoltProtocolV4::new(version),
        }
    }

    /// The negotiated version.
    pub fn version(&self) -> ProtocolVersion {
        self.v4.version()
    }

    /// The delegate for the transaction, run and routing flows.
    pub fn v4(&self) -> &BoltProtocolV4 {
        &self.v4
    }

    /// Before 5.1 HELLO carries the credentials. From 5.1 HELLO and LOGON
    /// are pipelined and answered together.
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
        if self.version() < ProtocolVersion::V5_1 {
            return self.v4.login(conn, user_agent, auth, notifications).await;
        }

        self.v4.v3().validate_notifications(notifications.as_ref())?;
        let info = conn.server_info_handle();
        let hello = HelloMessage::new(user_agent)
            .with_routing(self.v4.hello_routing(conn))
            .with_notifications(notifications);
        conn.enqueue(BoltRequest::Hello(hello), HelloHandler::new(info.clone(), false))?;
        conn.enqueue(BoltRequest::Logon(LogonMessage::new(auth)), LogonHandler::new(info))?;
        conn.sync().await
    }

    /// See [`BoltProtocolV4::logout`].
    pub async fn logout<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.logout(conn).await
    }

    /// See [`BoltProtocolV4::reset`].
    pub async fn reset<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.reset(conn).await
    }

    /// See [`BoltProtocolV4::begin_transaction`].
    pub async fn begin_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        extra: TransactionExtra,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.begin_transaction(conn, extra).await
    }

    /// See [`BoltProtocolV4::commit_transaction`].
    pub async fn commit_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        bookmarks: &BookmarksTracker,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.commit_transaction(conn, bookmarks).await
    }

    /// See [`BoltProtocolV4::rollback_transaction`].
    pub async fn rollback_transaction<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.rollback_transaction(conn).await
    }

    /// See [`BoltProtocolV4::run_auto_commit`].
    pub async fn run_auto_commit<S>(
        &self,
        conn: &mut Connection<S>,
        params: AutoCommitParams,
    ) -> BoltResult<ResultStream>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.run_auto_commit(conn, params).await
    }

    /// See [`BoltProtocolV4::run_explicit`].
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
        self.v4
            .run_explicit(conn, query, parameters, reactive, fetch_size)
            .await
    }

    /// See [`BoltProtocolV4::get_routing_table`].
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
        self.v4
            .get_routing_table(conn, database, impersonated_user, bookmarks)
            .await
    }

    /// See [`BoltProtocolV4::request_more`].
    pub async fn request_more<S>(
        &self,
        conn: &mut Connection<S>,
        stream: &ResultStream,
        n: i64,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.request_more(conn, stream, n).await
    }

    /// See [`BoltProtocolV4::cancel`].
    pub async fn cancel<S>(&self, conn: &mut Connection<S>, stream: &ResultStream) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v4.cancel(conn, stream).await
    }
}
