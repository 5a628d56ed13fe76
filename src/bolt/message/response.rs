//! Bolt protocol response messages.
//!
//! Response messages are sent from the server to the client.

use std::collections::HashMap;
use std::fmt;

use super::metadata::{Notification, QueryStats};
use super::tag;
use crate::bolt::packstream::{PackStreamError, PackStreamStructure, PackStreamValue};

/// All Bolt response messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltResponse {
    /// SUCCESS - Operation completed successfully
    Success(SuccessMessage),
    /// RECORD - Query result record
    Record(RecordMessage),
    /// FAILURE - Operation failed
    Failure(ServerFailure),
    /// IGNORED - Message was ignored (connection in FAILED state)
    Ignored,
}

impl BoltResponse {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltResponse::Success(_) => tag::SUCCESS,
            BoltResponse::Record(_) => tag::RECORD,
            BoltResponse::Failure(_) => tag::FAILURE,
            BoltResponse::Ignored => tag::IGNORED,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltResponse::Success(_) => "SUCCESS",
            BoltResponse::Record(_) => "RECORD",
            BoltResponse::Failure(_) => "FAILURE",
            BoltResponse::Ignored => "IGNORED",
        }
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        match self {
            BoltResponse::Success(msg) => msg.to_structure(),
            BoltResponse::Record(msg) => msg.to_structure(),
            BoltResponse::Failure(msg) => msg.to_structure(),
            BoltResponse::Ignored => PackStreamStructure::new(tag::IGNORED, vec![]),
        }
    }

    /// Build a response from a message signature and its decoded fields.
    pub fn from_fields(
        signature: u8,
        mut fields: Vec<PackStreamValue>,
    ) -> Result<Self, PackStreamError> {
        match signature {
            tag::SUCCESS => Ok(BoltResponse::Success(SuccessMessage::with_metadata(
                take_map(&mut fields, "SUCCESS")?,
            ))),
            tag::RECORD => match fields.pop() {
                Some(PackStreamValue::List(values)) if fields.is_empty() => {
                    Ok(BoltResponse::Record(RecordMessage::new(values)))
                }
                _ => Err(PackStreamError::InvalidStructure(
                    "RECORD requires a single list field".to_string(),
                )),
            },
            tag::FAILURE => Ok(BoltResponse::Failure(ServerFailure::from_map(&take_map(
                &mut fields,
                "FAILURE",
            )?))),
            tag::IGNORED => Ok(BoltResponse::Ignored),
            _ => Err(PackStreamError::InvalidStructure(format!(
                "Unknown response message tag: 0x{:02X}",
                signature
            ))),
        }
    }
}

fn take_map(
    fields: &mut Vec<PackStreamValue>,
    name: &str,
) -> Result<HashMap<String, PackStreamValue>, PackStreamError> {
    match fields.pop() {
        None => Ok(HashMap::new()),
        Some(PackStreamValue::Map(map)) if fields.is_empty() => Ok(map),
        _ => Err(PackStreamError::InvalidStructure(format!(
            "{} requires a single map field",
            name
        ))),
    }
}

impl fmt::Display for BoltResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltResponse::Success(msg) => write!(f, "SUCCESS {:?}", msg.metadata),
            BoltResponse::Record(msg) => write!(f, "RECORD {:?}", msg.fields),
            BoltResponse::Failure(failure) => write!(f, "FAILURE {}", failure),
            BoltResponse::Ignored => f.write_str("IGNORED"),
        }
    }
}

/// SUCCESS message - Operation completed successfully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: HashMap<String, PackStreamValue>,
}

impl SuccessMessage {
    /// Create a new SUCCESS message with empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a SUCCESS message with metadata.
    pub fn with_metadata(metadata: HashMap<String, PackStreamValue>) -> Self {
        Self { metadata }
    }

    /// Add metadata entry.
    pub fn with(mut self, key: &str, value: impl Into<PackStreamValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Get metadata entry.
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        self.metadata.get(key)
    }

    /// Server agent, answered to HELLO.
    pub fn server(&self) -> Option<&str> {
        self.metadata.get("server").and_then(|v| v.as_str())
    }

    /// Connection id, answered to HELLO.
    pub fn connection_id(&self) -> Option<&str> {
        self.metadata.get("connection_id").and_then(|v| v.as_str())
    }

    /// Configuration hints, answered to HELLO.
    pub fn hints(&self) -> Option<&HashMap<String, PackStreamValue>> {
        self.metadata.get("hints").and_then(|v| v.as_map())
    }

    /// Milliseconds until the first record was available.
    pub fn result_available_after(&self) -> Option<i64> {
        self.metadata.get("t_first").and_then(|v| v.as_int())
    }

    /// Milliseconds until the last record was consumed.
    pub fn result_consumed_after(&self) -> Option<i64> {
        self.metadata.get("t_last").and_then(|v| v.as_int())
    }

    /// Field names, answered to RUN.
    pub fn fields(&self) -> Option<Vec<String>> {
        self.metadata.get("fields").and_then(|v| v.as_string_list())
    }

    /// Query statistics. Missing counters are zero.
    pub fn stats(&self) -> QueryStats {
        self.metadata
            .get("stats")
            .and_then(|v| v.as_map())
            .map(QueryStats::from_map)
            .unwrap_or_default()
    }

    /// Notifications attached to a summary.
    pub fn notifications(&self) -> Vec<Notification> {
        self.metadata
            .get("notifications")
            .map(Notification::list_from_value)
            .unwrap_or_default()
    }

    /// Query type: `r`, `w`, `rw` or `s`.
    pub fn query_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(|v| v.as_str())
    }

    /// Whether more records remain after a PULL with a limit.
    pub fn has_more(&self) -> bool {
        self.metadata
            .get("has_more")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Bookmark, answered to COMMIT or to the final PULL of an auto-commit query.
    pub fn bookmark(&self) -> Option<&str> {
        self.metadata.get("bookmark").and_then(|v| v.as_str())
    }

    /// Database the query ran against.
    pub fn db(&self) -> Option<&str> {
        self.metadata.get("db").and_then(|v| v.as_str())
    }

    /// Query id, answered to RUN inside an explicit transaction.
    pub fn qid(&self) -> Option<i64> {
        self.metadata.get("qid").and_then(|v| v.as_int())
    }

    /// Routing table, answered to ROUTE.
    pub fn routing_table(&self) -> Option<&HashMap<String, PackStreamValue>> {
        self.metadata.get("rt").and_then(|v| v.as_map())
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::SUCCESS, vec![PackStreamValue::Map(self.metadata.clone())])
    }
}

/// RECORD message - Query result record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMessage {
    /// Values, in field order
    pub fields: Vec<PackStreamValue>,
}

impl RecordMessage {
    /// Create a record.
    pub fn new(fields: Vec<PackStreamValue>) -> Self {
        Self { fields }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no values.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&PackStreamValue> {
        self.fields.get(index)
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::RECORD, vec![PackStreamValue::List(self.fields.clone())])
    }
}

/// A FAILURE reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    /// Status code, e.g. `Neo.ClientError.Statement.SyntaxError`
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ServerFailure {
    /// Create a failure.
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Read a failure out of FAILURE metadata.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            code: get("code"),
            message: get("message"),
        }
    }

    /// Get error category (e.g., "ClientError").
    pub fn classification(&self) -> &str {
        self.code.split('.').nth(1).unwrap_or("")
    }

    /// Get error category (e.g., "Statement").
    pub fn category(&self) -> &str {
        self.code.split('.').nth(2).unwrap_or("")
    }

    /// Check if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.classification() == "ClientError"
    }

    /// Check if this is a transient error (retry may succeed).
    pub fn is_transient(&self) -> bool {
        self.classification() == "TransientError"
    }

    /// Check if this is a database error.
    pub fn is_database_error(&self) -> bool {
        self.classification() == "DatabaseError"
    }

    /// The client sent something the server could not accept. The
    /// connection cannot be reused.
    pub fn is_protocol_violation(&self) -> bool {
        self.is_client_error() && self.category() == "Request"
    }

    /// Check if this is an authentication or authorization error.
    pub fn is_authentication_error(&self) -> bool {
        self.is_client_error() && self.category() == "Security"
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        let mut metadata = HashMap::new();
        metadata.insert("code".to_string(), PackStreamValue::String(self.code.clone()));
        metadata.insert("message".to_string(), PackStreamValue::String(self.message.clone()));
        PackStreamStructure::new(tag::FAILURE, vec![PackStreamValue::Map(metadata)])
    }
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
