//! Query results streamed from the server.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::bolt::connection::Connection;
use crate::bolt::error::{BoltError, BoltResult};
use crate::bolt::message::{
    BoltRequest, Notification, PullMessage, QueryStats, ServerFailure, SuccessMessage, FETCH_ALL,
    NO_QID,
};
use crate::bolt::packstream::PackStreamValue;
use crate::bolt::pipeline::{BookmarksTracker, PullHandler};

/// State shared between a [`ResultStream`] and its RUN and PULL handlers.
#[derive(Debug)]
pub struct ResultState {
    pub(crate) keys: Arc<Vec<String>>,
    pub(crate) qid: i64,
    pub(crate) t_first: Option<i64>,
    pub(crate) records: VecDeque<Vec<PackStreamValue>>,
    pub(crate) has_more: bool,
    pub(crate) done: bool,
    pub(crate) summary: Option<SuccessMessage>,
    pub(crate) failure: Option<ServerFailure>,
}

impl Default for ResultState {
    fn default() -> Self {
        Self {
            keys: Arc::default(),
            qid: NO_QID,
            t_first: None,
            records: VecDeque::new(),
            // Nothing pulled yet, so records may remain.
            has_more: true,
            done: false,
            summary: None,
            failure: None,
        }
    }
}

impl ResultState {
    pub(crate) fn on_run_success(&mut self, success: &SuccessMessage) {
        if let Some(fields) = success.fields() {
            self.keys = Arc::new(fields);
        }
        if let Some(qid) = success.qid() {
            self.qid = qid;
        }
        self.t_first = success.result_available_after();
    }

    pub(crate) fn on_pull_success(&mut self, success: SuccessMessage) {
        self.has_more = success.has_more();
        if !self.has_more {
            self.done = true;
            self.summary = Some(success);
        }
    }

    pub(crate) fn on_failure(&mut self, failure: &ServerFailure) {
        self.failure = Some(failure.clone());
        self.has_more = false;
        self.done = true;
    }

    pub(crate) fn on_ignored(&mut self) {
        self.has_more = false;
        self.done = true;
    }
}

/// One row of a result.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    keys: Arc<Vec<String>>,
    values: Vec<PackStreamValue>,
}

impl Record {
    /// Create a record.
    pub fn new(keys: Arc<Vec<String>>, values: Vec<PackStreamValue>) -> Self {
        Self { keys, values }
    }

    /// Field names.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Values, in field order.
    pub fn values(&self) -> &[PackStreamValue] {
        &self.values
    }

    /// Value of field `key`.
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        let index = self.keys.iter().position(|k| k == key)?;
        self.values.get(index)
    }

    /// Take the values.
    pub fn into_values(self) -> Vec<PackStreamValue> {
        self.values
    }
}

/// The metadata that ends a result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    /// Milliseconds until the first record was available
    pub result_available_after: Option<i64>,
    /// Milliseconds until the last record was consumed
    pub result_consumed_after: Option<i64>,
    /// `r`, `w`, `rw` or `s`
    pub query_type: Option<String>,
    /// Database the query ran against
    pub database: Option<String>,
    /// Bookmark of an auto-commit query
    pub bookmark: Option<String>,
    /// Update counters
    pub stats: QueryStats,
    /// Server notifications
    pub notifications: Vec<Notification>,
}

impl ResultSummary {
    fn new(t_first: Option<i64>, success: &SuccessMessage) -> Self {
        Self {
            result_available_after: t_first,
            result_consumed_after: success.result_consumed_after(),
            query_type: success.query_type().map(str::to_string),
            database: success.db().map(str::to_string),
            bookmark: success.bookmark().map(str::to_string),
            stats: success.stats(),
            notifications: success.notifications(),
        }
    }
}

/// The records of one query, fetched from the server as they are consumed.
///
/// Records are buffered by the connection's handlers. When the buffer runs
/// dry, [`next_record`](Self::next_record) reads further responses and, for
/// non-reactive results, asks the server for the next batch.
#[derive(Debug, Clone)]
pub struct ResultStream {
    state: Arc<Mutex<ResultState>>,
    fetch_size: i64,
    reactive: bool,
    bookmarks: Option<BookmarksTracker>,
}

impl ResultStream {
    pub(crate) fn new(
        state: Arc<Mutex<ResultState>>,
        fetch_size: i64,
        reactive: bool,
        bookmarks: Option<BookmarksTracker>,
    ) -> Self {
        Self {
            state,
            fetch_size,
            reactive,
            bookmarks,
        }
    }

    /// Field names. Empty until the RUN response has been read.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().keys.to_vec()
    }

    /// Query id inside an explicit transaction, [`NO_QID`] otherwise.
    pub fn qid(&self) -> i64 {
        self.state.lock().qid
    }

    /// Whether the server holds further records not yet requested.
    pub fn has_more(&self) -> bool {
        let state = self.state.lock();
        state.has_more && !state.done
    }

    /// Whether the summary or a failure has arrived.
    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Whether the result is driven by explicit [`request_more`] calls.
    ///
    /// [`request_more`]: crate::bolt::protocol::BoltProtocol::request_more
    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    /// Number of records received and not yet consumed.
    pub fn buffered(&self) -> usize {
        self.state.lock().records.len()
    }

    /// The failure that ended the result, if any.
    pub fn failure(&self) -> Option<ServerFailure> {
        self.state.lock().failure.clone()
    }

    /// The summary, once every record has been received.
    pub fn summary(&self) -> Option<ResultSummary> {
        let state = self.state.lock();
        state
            .summary
            .as_ref()
            .map(|metadata| ResultSummary::new(state.t_first, metadata))
    }

    /// Queue a PULL for `n` more records. The caller flushes.
    pub(crate) fn enqueue_pull<S>(&self, conn: &mut Connection<S>, n: i64) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let pull = PullMessage::new(n, self.qid());
        let handler = PullHandler::new(self.state.clone()).with_bookmarks(self.bookmarks.clone());
        conn.enqueue(BoltRequest::Pull(pull), handler)
    }

    /// Queue a DISCARD of every remaining record. The caller flushes.
    pub(crate) fn enqueue_discard<S>(&self, conn: &mut Connection<S>) -> BoltResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let discard = PullMessage::new(FETCH_ALL, self.qid());
        let handler = PullHandler::new(self.state.clone()).with_bookmarks(self.bookmarks.clone());
        conn.enqueue(BoltRequest::Discard(discard), handler)
    }

    /// Next record, or `None` once the result is exhausted.
    pub async fn next_record<S>(&self, conn: &mut Connection<S>) -> BoltResult<Option<Record>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        loop {
            let has_more = {
                let mut state = self.state.lock();
                if let Some(values) = state.records.pop_front() {
                    return Ok(Some(Record::new(state.keys.clone(), values)));
                }
                if let Some(failure) = &state.failure {
                    return Err(BoltError::Server(failure.clone()));
                }
                if state.done {
                    return Ok(None);
                }
                state.has_more
            };

            if !conn.pipeline().has_no_pending_messages() {
                conn.receive_one().await?;
            } else if has_more && !self.reactive {
                self.enqueue_pull(conn, self.fetch_size)?;
                conn.send().await?;
            } else {
                return Err(BoltError::client(
                    "No records have been requested for this result",
                ));
            }
        }
    }

    /// Read every remaining record.
    pub async fn collect<S>(&self, conn: &mut Connection<S>) -> BoltResult<Vec<Record>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut records = Vec::new();
        while let Some(record) = self.next_record(conn).await? {
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn metadata(entries: Vec<(&str, PackStreamValue)>) -> SuccessMessage {
        SuccessMessage::with_metadata(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_state_lifecycle() {
        let mut state = ResultState::default();
        assert_eq!(state.qid, NO_QID);
        assert!(state.has_more);

        state.on_run_success(&metadata(vec![
            ("fields", vec!["n".to_string()].into()),
            ("qid", 3i64.into()),
            ("t_first", 5i64.into()),
        ]));
        assert_eq!(state.keys.as_slice(), ["n".to_string()]);
        assert_eq!(state.qid, 3);

        state.on_pull_success(metadata(vec![("has_more", true.into())]));
        assert!(state.has_more);
        assert!(!state.done);

        state.on_pull_success(metadata(vec![("bookmark", "bm".into())]));
        assert!(state.done);
        assert!(state.summary.is_some());
    }

    #[test]
    fn test_summary() {
        let state = Arc::new(Mutex::new(ResultState::default()));
        let stream = ResultStream::new(state.clone(), 1000, false, None);
        assert!(stream.summary().is_none());

        let mut stats = HashMap::new();
        stats.insert("nodes-created".to_string(), 1i64.into());
        {
            let mut state = state.lock();
            state.t_first = Some(2);
            state.on_pull_success(metadata(vec![
                ("type", "w".into()),
                ("db", "neo4j".into()),
                ("t_last", 4i64.into()),
                ("stats", PackStreamValue::Map(stats)),
            ]));
        }

        let summary = stream.summary().unwrap();
        assert_eq!(summary.result_available_after, Some(2));
        assert_eq!(summary.result_consumed_after, Some(4));
        assert_eq!(summary.query_type.as_deref(), Some("w"));
        assert_eq!(summary.database.as_deref(), Some("neo4j"));
        assert_eq!(summary.stats.nodes_created, 1);
        assert!(stream.is_done());
        assert!(!stream.has_more());
    }

    #[test]
    fn test_record_access() {
        let record = Record::new(
            Arc::new(vec!["a".to_string(), "b".to_string()]),
            vec![1i64.into(), "x".into()],
        );
        assert_eq!(record.get("b"), Some(&PackStreamValue::String("x".into())));
        assert!(record.get("c").is_none());
        assert_eq!(record.keys().len(), 2);
        assert_eq!(record.into_values().len(), 2);
    }

    #[test]
    fn test_failure_ends_result() {
        let mut state = ResultState::default();
        state.on_failure(&ServerFailure::new("Neo.ClientError.Statement.SyntaxError", "bad"));
        assert!(state.done);
        assert!(!state.has_more);
        assert!(state.failure.is_some());
    }
}
