//! Bolt 3.0: HELLO with credentials, PULL_ALL, no databases.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{blank_to_none, routing, AutoCommitParams};
use crate::bolt::connection::Connection;
use crate::bolt::error::{BoltError, BoltResult};
use crate::bolt::handshake::ProtocolVersion;
use crate::bolt::message::{
    AccessMode, AuthToken, BeginMessage, BoltRequest, HelloMessage, NotificationsConfig,
    PullMessage, RunMessage, TransactionExtra, FETCH_ALL, NO_QID,
};
use crate::bolt::packstream::PackStreamValue;
use crate::bolt::pipeline::{
    BookmarksTracker, CommitHandler, HelloHandler, NoOpHandler, PullHandler, ResetHandler,
    RunHandler,
};
use crate::bolt::result::{ResultState, ResultStream};

const ROUTING_PROCEDURE: &str = "CALL dbms.cluster.routing.getRoutingTable($context)";

/// Bolt 3.0, and the capability checks every later version delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoltProtocolV3 {
    version: ProtocolVersion,
}

impl Default for BoltProtocolV3 {
    fn default() -> Self {
        Self::new(ProtocolVersion::V3_0)
    }
}

impl BoltProtocolV3 {
    /// Checks are made against `version`, the version actually negotiated.
    pub(crate) fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    /// The negotiated version.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    // ========================================================================
    // Capability checks
    // ========================================================================

    /// Reject an impersonated user below 4.4.
    pub fn validate_impersonated_user(&self, user: Option<&str>) -> BoltResult<()> {
        if self.version >= ProtocolVersion::V4_4 || blank_to_none(user).is_none() {
            return Ok(());
        }
        Err(BoltError::client(format!(
            "Bolt protocol {} does not support impersonation, but an impersonated user was supplied",
            self.version
        )))
    }

    /// Reject a notification filter below 5.2.
    pub fn validate_notifications(&self, config: Option<&NotificationsConfig>) -> BoltResult<()> {
        if self.version >= ProtocolVersion::V5_2 || config.is_none() {
            return Ok(());
        }
        Err(BoltError::client(format!(
            "Bolt protocol {} does not support notification filters; 5.2 or later is required",
            self.version
        )))
    }

    /// Reject a database name below 4.0.
    pub fn validate_database(&self, database: Option<&str>) -> BoltResult<()> {
        if self.version >= ProtocolVersion::V4_0 || blank_to_none(database).is_none() {
            return Ok(());
        }
        Err(BoltError::client(
            "Driver is connected to a server that does not support multiple databases. \
             Upgrade the server to 4.0 or later in order to use this functionality",
        ))
    }

    /// Run every check that applies to transaction settings, then blank
    /// names out.
    pub(crate) fn prepare_extra(&self, mut extra: TransactionExtra) -> BoltResult<TransactionExtra> {
        self.validate_impersonated_user(extra.impersonated_user.as_deref())?;
        self.validate_notifications(extra.notifications.as_ref())?;
        self.validate_database(extra.database.as_deref())?;
        extra.database = blank_to_none(extra.database.as_deref()).map(str::to_string);
        extra.impersonated_user = blank_to_none(extra.impersonated_user.as_deref()).map(str::to_string);
        Ok(extra)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// HELLO carrying the credentials.
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
        self.validate_notifications(notifications.as_ref())?;
        let hello = HelloMessage::new(user_agent).with_auth(auth);
        let handler = HelloHandler::new(conn.server_info_handle(), true);
        conn.enqueue(BoltRequest::Hello(hello), handler)?;
        conn.sync().await
    }

    /// Say GOODBYE and close. The server does not answer.
    pub async fn logout<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        conn.write(&BoltRequest::Goodbye)?;
        conn.send().await?;
        conn.close().await
    }

    /// RESET, clearing any stored failure.
    pub async fn reset<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        conn.enqueue(BoltRequest::Reset, ResetHandler)?;
        conn.sync().await
    }

    /// BEGIN an explicit transaction.
    pub async fn begin_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        extra: TransactionExtra,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let extra = self.prepare_extra(extra)?;
        conn.enqueue(BoltRequest::Begin(BeginMessage::new(extra)), NoOpHandler)?;
        conn.sync().await
    }

    /// COMMIT, storing the resulting bookmark in `bookmarks`.
    pub async fn commit_transaction<S>(
        &self,
        conn: &mut Connection<S>,
        bookmarks: &BookmarksTracker,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        conn.enqueue(BoltRequest::Commit, CommitHandler::new(bookmarks.clone()))?;
        conn.sync().await
    }

    /// ROLLBACK.
    pub async fn rollback_transaction<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        conn.enqueue(BoltRequest::Rollback, NoOpHandler)?;
        conn.sync().await
    }

    /// RUN outside a transaction. 3.0 always streams the whole result, so
    /// the fetch size and the reactive flag do not apply.
    pub async fn run_auto_commit<S>(
        &self,
        conn: &mut Connection<S>,
        params: AutoCommitParams,
    ) -> BoltResult<ResultStream>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let extra = self.prepare_extra(params.extra)?;
        let run = RunMessage::new(&params.query)
            .with_parameters(params.parameters)
            .with_extra(extra);
        start_run(conn, run, params.bookmarks, false, FETCH_ALL).await
    }

    /// RUN inside the open transaction, pulling everything.
    pub async fn run_explicit<S>(
        &self,
        conn: &mut Connection<S>,
        query: &str,
        parameters: HashMap<String, PackStreamValue>,
    ) -> BoltResult<ResultStream>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let run = RunMessage::new(query).with_parameters(parameters);
        start_run(conn, run, None, false, FETCH_ALL).await
    }

    /// Ask for more records. 3.0 cannot limit a PULL, so this pulls the rest.
    pub async fn request_more<S>(
        &self,
        conn: &mut Connection<S>,
        stream: &ResultStream,
        n: i64,
    ) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        stream.enqueue_pull(conn, n)?;
        conn.send().await
    }

    /// Discard the rest of `stream`.
    pub async fn cancel<S>(&self, conn: &mut Connection<S>, stream: &ResultStream) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        stream.enqueue_discard(conn)?;
        conn.send().await
    }

    /// Fetch the routing table through the cluster procedure. The procedure
    /// takes no database; `database` is only echoed into the table.
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
        self.validate_impersonated_user(impersonated_user)?;

        let mut parameters = HashMap::new();
        parameters.insert("context".to_string(), routing::context_value(conn));
        let extra = TransactionExtra {
            bookmarks: bookmarks.to_vec(),
            mode: AccessMode::Read,
            ..Default::default()
        };
        let run = RunMessage::new(ROUTING_PROCEDURE)
            .with_parameters(parameters)
            .with_extra(extra);

        let outcome = routing::run_procedure(conn, run).await;
        let mut table = routing::close_on_error(conn, outcome).await?;
        table.insert("db".to_string(), PackStreamValue::from(blank_to_none(database)));
        Ok(table)
    }
}

/// Enqueue RUN, and PULL unless `reactive`, then flush.
pub(crate) async fn start_run<S>(
    conn: &mut Connection<S>,
    run: RunMessage,
    bookmarks: Option<BookmarksTracker>,
    reactive: bool,
    fetch_size: i64,
) -> BoltResult<ResultStream>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let state = Arc::new(Mutex::new(ResultState::default()));
    conn.enqueue(BoltRequest::Run(run), RunHandler::new(state.clone()))?;
    if !reactive {
        let handler = PullHandler::new(state.clone()).with_bookmarks(bookmarks.clone());
        conn.enqueue(BoltRequest::Pull(PullMessage::new(fetch_size, NO_QID)), handler)?;
    }
    conn.send().await?;
    Ok(ResultStream::new(state, fetch_size, reactive, bookmarks))
}
