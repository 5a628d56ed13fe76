//! Bolt 4.x: databases, batched PULL with query ids, and routing through
//! the `system` database or the ROUTE message.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};

use super::v3::{start_run, BoltProtocolV3};
use super::{blank_to_none, routing, AutoCommitParams};
use crate::bolt::connection::Connection;
use crate::bolt::error::BoltResult;
use crate::bolt::handshake::ProtocolVersion;
use crate::bolt::message::{
    AccessMode, AuthToken, BoltRequest, HelloMessage, NotificationsConfig, RouteMessage,
    RunMessage, TransactionExtra,
};
use crate::bolt::packstream::PackStreamValue;
use crate::bolt::pipeline::{BookmarksTracker, HelloHandler};
use crate::bolt::result::ResultStream;

const ROUTING_PROCEDURE: &str = "CALL dbms.routing.getRoutingTable($context, $database)";
const SYSTEM_DATABASE: &str = "system";

/// Bolt 4.0 through 4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoltProtocolV4 {
    v3: BoltProtocolV3,
}

impl BoltProtocolV4 {
    pub(crate) fn new(version: ProtocolVersion) -> Self {
        Self {
            v3: BoltProtocolV3::new(version),
        }
    }

    /// The negotiated version.
    pub fn version(&self) -> ProtocolVersion {
        self.v3.version()
    }

    /// The delegate that performs capability checks and the flows that
    /// did not change since 3.0.
    pub fn v3(&self) -> &BoltProtocolV3 {
        &self.v3
    }

    /// HELLO carrying the credentials, and the routing context from 4.1.
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
        self.v3.validate_notifications(notifications.as_ref())?;
        let hello = HelloMessage::new(user_agent)
            .with_auth(auth)
            .with_routing(self.hello_routing(conn));
        let handler = HelloHandler::new(conn.server_info_handle(), true);
        conn.enqueue(BoltRequest::Hello(hello), handler)?;
        conn.sync().await
    }

    pub(crate) fn hello_routing<S>(&self, conn: &Connection<S>) -> Option<HashMap<String, String>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if self.version() < ProtocolVersion::V4_1 {
            return None;
        }
        conn.config().routing_context.clone()
    }

    /// RUN outside a transaction, followed by the first PULL of
    /// `params.fetch_size` records unless the result is reactive.
    pub async fn run_auto_commit<S>(
        &self,
        conn: &mut Connection<S>,
        params: AutoCommitParams,
    ) -> BoltResult<ResultStream>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let extra = self.v3.prepare_extra(params.extra)?;
        let run = RunMessage::new(&params.query)
            .with_parameters(params.parameters)
            .with_extra(extra);
        start_run(conn, run, params.bookmarks, params.reactive, params.fetch_size).await
    }

    /// RUN inside the open transaction.
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
        let run = RunMessage::new(query).with_parameters(parameters);
        start_run(conn, run, None, reactive, fetch_size).await
    }

    /// Fetch the routing table for `database`, or for the home database
    /// when `None`.
    ///
    /// 4.3 and later ask with ROUTE. Earlier 4.x versions call the routing
    /// procedure in the `system` database. The result always carries `db`.
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
        self.v3.validate_impersonated_user(impersonated_user)?;
        let database = blank_to_none(database).map(str::to_string);
        let impersonated_user = blank_to_none(impersonated_user).map(str::to_string);

        if self.version() >= ProtocolVersion::V4_3 {
            let message = RouteMessage {
                routing: conn.config().routing_context.clone().unwrap_or_default(),
                bookmarks: bookmarks.to_vec(),
                database: database.clone(),
                impersonated_user,
            };
            let outcome = routing::route(conn, message).await;
            let mut table = routing::close_on_error(conn, outcome).await?;
            if self.version() < ProtocolVersion::V4_4 {
                table.insert("db".to_string(), PackStreamValue::from(database));
            }
            return Ok(table);
        }

        let mut parameters = HashMap::new();
        parameters.insert("context".to_string(), routing::context_value(conn));
        parameters.insert("database".to_string(), PackStreamValue::from(database.clone()));
        let extra = TransactionExtra {
            bookmarks: bookmarks.to_vec(),
            mode: AccessMode::Read,
            database: Some(SYSTEM_DATABASE.to_string()),
            ..Default::default()
        };
        let run = RunMessage::new(ROUTING_PROCEDURE)
            .with_parameters(parameters)
            .with_extra(extra);

        let outcome = routing::run_procedure(conn, run).await;
        let mut table = routing::close_on_error(conn, outcome).await?;
        table.insert("db".to_string(), PackStreamValue::from(database));
        Ok(table)
    }

    // ========================================================================
    // Unchanged since 3.0
    // ========================================================================

    /// See [`BoltProtocolV3::logout`].
    pub async fn logout<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v3.logout(conn).await
    }

    /// See [`BoltProtocolV3::reset`].
    pub async fn reset<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v3.reset(conn).await
    }

    /// See [`BoltProtocolV3::begin_transaction`].
    pub async fn begin_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        extra: TransactionExtra,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v3.begin_transaction(conn, extra).await
    }

    /// See [`BoltProtocolV3::commit_transaction`].
    pub async fn commit_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        bookmarks: &BookmarksTracker,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v3.commit_transaction(conn, bookmarks).await
    }

    /// See [`BoltProtocolV3::rollback_transaction`].
    pub async fn rollback_transaction<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v3.rollback_transaction(conn).await
    }

    /// PULL `n` more records of `stream`.
    pub async fn request_more<S>(
        &self,
        conn: &mut Connection<S>,
        stream: &ResultStream,
        n: i64,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v3.request_more(conn, stream, n).await
    }

    /// DISCARD the rest of `stream`.
    pub async fn cancel<S>(&self, conn: &mut Connection<S>, stream: &ResultStream) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.v3.cancel(conn, stream).await
    }
}
