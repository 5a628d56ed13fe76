//! Handlers for each request kind.
//!
//! Handlers write into state shared with the caller through
//! `Arc<parking_lot::Mutex<_>>`. The lock is only ever taken by the task
//! driving the connection and by the caller between reads.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::ResponseHandler;
use crate::bolt::error::BoltResult;
use crate::bolt::message::{ServerFailure, SuccessMessage};
use crate::bolt::packstream::PackStreamValue;
use crate::bolt::result::ResultState;

// ============================================================================
// Shared state
// ============================================================================

/// What the server told us about itself in answer to HELLO.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerInfo {
    /// Server agent, e.g. `Neo4j/5.2.0`
    pub agent: Option<String>,
    /// Server-assigned connection id
    pub connection_id: Option<String>,
    /// Configuration hints
    pub hints: HashMap<String, PackStreamValue>,
    /// Whether authentication succeeded
    pub authenticated: bool,
}

/// The latest bookmark seen on a session, shared between handlers.
#[derive(Debug, Clone, Default)]
pub struct BookmarksTracker {
    bookmark: Arc<Mutex<Option<String>>>,
}

impl BookmarksTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker seeded with `bookmark`.
    pub fn with_bookmark(bookmark: impl Into<String>) -> Self {
        let tracker = Self::new();
        tracker.set(bookmark);
        tracker
    }

    /// The latest bookmark.
    pub fn get(&self) -> Option<String> {
        self.bookmark.lock().clone()
    }

    /// The latest bookmark as the list sent in BEGIN, RUN and ROUTE.
    pub fn bookmarks(&self) -> Vec<String> {
        self.get().into_iter().collect()
    }

    /// Replace the latest bookmark.
    pub fn set(&self, bookmark: impl Into<String>) {
        *self.bookmark.lock() = Some(bookmark.into());
    }

    fn update_from(&self, success: &SuccessMessage) {
        if let Some(bookmark) = success.bookmark() {
            self.set(bookmark);
        }
    }
}

/// Field names and records gathered by a [`RecordCollector`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedRecords {
    /// Field names from the RUN response
    pub fields: Vec<String>,
    /// Records, in arrival order
    pub records: Vec<Vec<PackStreamValue>>,
}

impl CollectedRecords {
    /// Zip the field names with the only record. `None` unless exactly one
    /// record arrived.
    pub fn single_as_map(&self) -> Option<HashMap<String, PackStreamValue>> {
        match self.records.as_slice() {
            [values] => Some(
                self.fields
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect(),
            ),
            _ => None,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Discards the response.
#[derive(Debug, Default)]
pub struct NoOpHandler;

impl ResponseHandler for NoOpHandler {
    fn on_success(&mut self, _success: SuccessMessage) {}

    fn on_failure(&mut self, _failure: &ServerFailure) {}
}

/// Stores server details from the HELLO response.
#[derive(Debug)]
pub struct HelloHandler {
    info: Arc<Mutex<ServerInfo>>,
    authenticates: bool,
}

impl HelloHandler {
    /// `authenticates` is true when HELLO carries the credentials, i.e.
    /// before 5.1.
    pub fn new(info: Arc<Mutex<ServerInfo>>, authenticates: bool) -> Self {
        Self {
            info,
            authenticates,
        }
    }
}

impl ResponseHandler for HelloHandler {
    fn on_success(&mut self, success: SuccessMessage) {
        let mut info = self.info.lock();
        info.agent = success.server().map(str::to_string);
        info.connection_id = success.connection_id().map(str::to_string);
        info.hints = success.hints().cloned().unwrap_or_default();
        if self.authenticates {
            info.authenticated = true;
        }
        debug!(
            "Connected to {} as {}",
            info.agent.as_deref().unwrap_or("unknown server"),
            info.connection_id.as_deref().unwrap_or("?")
        );
    }

    fn on_failure(&mut self, failure: &ServerFailure) {
        debug!("HELLO failed: {}", failure);
    }
}

/// Marks the connection authenticated on LOGON success.
#[derive(Debug)]
pub struct LogonHandler {
    info: Arc<Mutex<ServerInfo>>,
}

impl LogonHandler {
    /// Create a handler updating `info`.
    pub fn new(info: Arc<Mutex<ServerInfo>>) -> Self {
        Self { info }
    }
}

impl ResponseHandler for LogonHandler {
    fn on_success(&mut self, _success: SuccessMessage) {
        self.info.lock().authenticated = true;
    }

    fn on_failure(&mut self, failure: &ServerFailure) {
        self.info.lock().authenticated = false;
        debug!("LOGON failed: {}", failure);
    }
}

/// Clears the pipeline's stored failure once RESET succeeds.
#[derive(Debug, Default)]
pub struct ResetHandler;

impl ResponseHandler for ResetHandler {
    fn on_success(&mut self, _success: SuccessMessage) {}

    fn on_failure(&mut self, _failure: &ServerFailure) {}

    fn resets_pipeline(&self) -> bool {
        true
    }
}

/// Records the field names, query id and `t_first` from a RUN response.
#[derive(Debug)]
pub struct RunHandler {
    state: Arc<Mutex<ResultState>>,
}

impl RunHandler {
    /// Create a handler filling `state`.
    pub fn new(state: Arc<Mutex<ResultState>>) -> Self {
        Self { state }
    }
}

impl ResponseHandler for RunHandler {
    fn on_success(&mut self, success: SuccessMessage) {
        self.state.lock().on_run_success(&success);
    }

    fn on_failure(&mut self, failure: &ServerFailure) {
        self.state.lock().on_failure(failure);
    }
}

/// Buffers records from a PULL or DISCARD and the summary that ends them.
#[derive(Debug)]
pub struct PullHandler {
    state: Arc<Mutex<ResultState>>,
    bookmarks: Option<BookmarksTracker>,
}

impl PullHandler {
    /// Create a handler filling `state`.
    pub fn new(state: Arc<Mutex<ResultState>>) -> Self {
        Self {
            state,
            bookmarks: None,
        }
    }

    /// Store the final bookmark of an auto-commit query in `tracker`.
    pub fn with_bookmarks(mut self, tracker: Option<BookmarksTracker>) -> Self {
        self.bookmarks = tracker;
        self
    }
}

impl ResponseHandler for PullHandler {
    fn on_success(&mut self, success: SuccessMessage) {
        if let Some(tracker) = &self.bookmarks {
            tracker.update_from(&success);
        }
        self.state.lock().on_pull_success(success);
    }

    fn on_record(&mut self, fields: Vec<PackStreamValue>) -> BoltResult<()> {
        self.state.lock().records.push_back(fields);
        Ok(())
    }

    fn on_failure(&mut self, failure: &ServerFailure) {
        self.state.lock().on_failure(failure);
    }

    fn on_ignored(&mut self) {
        self.state.lock().on_ignored();
    }
}

/// Captures the routing table from a ROUTE response.
#[derive(Debug)]
pub struct RouteHandler {
    table: Arc<Mutex<Option<HashMap<String, PackStreamValue>>>>,
}

impl RouteHandler {
    /// Create a handler storing into `table`.
    pub fn new(table: Arc<Mutex<Option<HashMap<String, PackStreamValue>>>>) -> Self {
        Self { table }
    }
}

impl ResponseHandler for RouteHandler {
    fn on_success(&mut self, success: SuccessMessage) {
        *self.table.lock() = success.routing_table().cloned();
    }

    fn on_failure(&mut self, _failure: &ServerFailure) {}
}

/// Stores the bookmark from a COMMIT response.
#[derive(Debug)]
pub struct CommitHandler {
    bookmarks: BookmarksTracker,
}

impl CommitHandler {
    /// Create a handler updating `bookmarks`.
    pub fn new(bookmarks: BookmarksTracker) -> Self {
        Self { bookmarks }
    }
}

impl ResponseHandler for CommitHandler {
    fn on_success(&mut self, success: SuccessMessage) {
        self.bookmarks.update_from(&success);
    }

    fn on_failure(&mut self, _failure: &ServerFailure) {}
}

/// Collects field names and every record, for queries the engine runs on
/// its own behalf. Enqueue one for the RUN and one for the PULL.
#[derive(Debug)]
pub struct RecordCollector {
    state: Arc<Mutex<CollectedRecords>>,
}

impl RecordCollector {
    /// Create a collector filling `state`.
    pub fn new(state: Arc<Mutex<CollectedRecords>>) -> Self {
        Self { state }
    }
}

impl ResponseHandler for RecordCollector {
    fn on_success(&mut self, success: SuccessMessage) {
        if let Some(fields) = success.fields() {
            self.state.lock().fields = fields;
        }
    }

    fn on_record(&mut self, fields: Vec<PackStreamValue>) -> BoltResult<()> {
        self.state.lock().records.push(fields);
        Ok(())
    }

    fn on_failure(&mut self, _failure: &ServerFailure) {}
}
