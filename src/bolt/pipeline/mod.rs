//! In-order matching of server responses to requests.
//!
//! Bolt servers answer requests strictly in the order they were sent, so
//! every request that expects an answer enqueues a [`ResponseHandler`] and
//! every terminal response (SUCCESS, FAILURE, IGNORED) completes the oldest
//! one. RECORDs stream into the oldest handler without completing it.
//!
//! Once a request fails the server ignores everything up to the next RESET.
//! The pipeline remembers the failure until RESET succeeds and hands it to
//! each handler whose request was ignored because of it. The caller is told
//! about it once.

mod handlers;

use std::collections::VecDeque;

use tracing::debug;

use crate::bolt::error::{BoltError, BoltResult};
use crate::bolt::message::{BoltResponse, ServerFailure, SuccessMessage};
use crate::bolt::packstream::PackStreamValue;

pub use handlers::{
    BookmarksTracker, CollectedRecords, CommitHandler, HelloHandler, LogonHandler, NoOpHandler,
    PullHandler, RecordCollector, ResetHandler, RouteHandler, RunHandler, ServerInfo,
};

/// Receives the responses to one request.
///
/// A handler sees zero or more records followed by exactly one terminal
/// call.
pub trait ResponseHandler: Send {
    /// The request succeeded.
    fn on_success(&mut self, success: SuccessMessage);

    /// A record arrived. Handlers that do not expect records reject them.
    fn on_record(&mut self, fields: Vec<PackStreamValue>) -> BoltResult<()> {
        Err(BoltError::protocol(format!(
            "Unexpected RECORD with {} fields",
            fields.len()
        )))
    }

    /// The request failed, or was ignored because an earlier one failed.
    fn on_failure(&mut self, failure: &ServerFailure);

    /// The request was ignored without a preceding failure.
    fn on_ignored(&mut self) {}

    /// Whether a successful response clears the pipeline's stored failure.
    fn resets_pipeline(&self) -> bool {
        false
    }
}

/// FIFO queue of handlers awaiting responses.
#[derive(Default)]
pub struct ResponsePipeline {
    handlers: VecDeque<Box<dyn ResponseHandler>>,
    failure: Option<ServerFailure>,
    reported: bool,
}

impl ResponsePipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for the most recently written request.
    pub fn enqueue(&mut self, handler: Box<dyn ResponseHandler>) {
        self.handlers.push_back(handler);
    }

    /// Number of requests still awaiting a terminal response.
    pub fn pending(&self) -> usize {
        self.handlers.len()
    }

    /// Whether every request has been answered.
    pub fn has_no_pending_messages(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Whether a failure is stored, reported or not.
    pub fn has_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Route one response to the handler it answers.
    pub fn dispatch(&mut self, response: BoltResponse) -> BoltResult<()> {
        match response {
            BoltResponse::Success(msg) => self.on_success(msg),
            BoltResponse::Record(msg) => self.on_record(msg.fields),
            BoltResponse::Failure(failure) => self.on_failure(failure),
            BoltResponse::Ignored => self.on_ignored(),
        }
    }

    /// Complete the oldest handler with SUCCESS.
    pub fn on_success(&mut self, success: SuccessMessage) -> BoltResult<()> {
        debug!("S: SUCCESS {:?}", success.metadata);
        let mut handler = self.dequeue("SUCCESS")?;
        handler.on_success(success);
        if handler.resets_pipeline() {
            self.failure = None;
            self.reported = false;
        }
        Ok(())
    }

    /// Stream a RECORD into the oldest handler.
    pub fn on_record(&mut self, fields: Vec<PackStreamValue>) -> BoltResult<()> {
        debug!("S: RECORD {:?}", fields);
        match self.handlers.front_mut() {
            Some(handler) => handler.on_record(fields),
            None => Err(BoltError::protocol("Received RECORD with no pending request")),
        }
    }

    /// Complete the oldest handler with FAILURE and remember the failure.
    pub fn on_failure(&mut self, failure: ServerFailure) -> BoltResult<()> {
        debug!("S: FAILURE {}", failure);
        let mut handler = self.dequeue("FAILURE")?;
        handler.on_failure(&failure);
        self.failure = Some(failure);
        self.reported = false;
        Ok(())
    }

    /// Complete the oldest handler with IGNORED.
    pub fn on_ignored(&mut self) -> BoltResult<()> {
        debug!("S: IGNORED");
        let mut handler = self.dequeue("IGNORED")?;
        match &self.failure {
            Some(failure) => handler.on_failure(failure),
            None => handler.on_ignored(),
        }
        Ok(())
    }

    /// Report the stored failure if it has not been reported yet.
    pub fn assert_no_failure(&mut self) -> BoltResult<()> {
        match &self.failure {
            Some(failure) if !self.reported => {
                self.reported = true;
                Err(BoltError::Server(failure.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Like [`assert_no_failure`](Self::assert_no_failure), but only for a
    /// protocol violation.
    pub fn assert_no_protocol_violation(&mut self) -> BoltResult<()> {
        if self.failure.as_ref().is_some_and(ServerFailure::is_protocol_violation) {
            return self.assert_no_failure();
        }
        Ok(())
    }

    fn dequeue(&mut self, message: &str) -> BoltResult<Box<dyn ResponseHandler>> {
        self.handlers.pop_front().ok_or_else(|| {
            BoltError::protocol(format!("Received {} with no pending request", message))
        })
    }
}

impl std::fmt::Debug for ResponsePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsePipeline")
            .field("pending", &self.handlers.len())
            .field("failure", &self.failure)
            .field("reported", &self.reported)
            .finish()
    }
}
