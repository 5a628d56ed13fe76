//! Bolt protocol request messages.
//!
//! Request messages are sent from the client to the server. Field layouts
//! differ between protocol versions, so every request is rendered for the
//! negotiated [`ProtocolVersion`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::metadata::NotificationSeverity;
use super::tag;
use crate::bolt::handshake::ProtocolVersion;
use crate::bolt::packstream::{PackStreamStructure, PackStreamValue};

/// Pull or discard every remaining record.
pub const FETCH_ALL: i64 = -1;

/// Query id meaning "the most recent query".
pub const NO_QID: i64 = -1;

/// Access mode for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-write access (default)
    #[default]
    Write,
    /// Read-only access
    Read,
}

impl AccessMode {
    /// Convert to string for metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::Write => "w",
        }
    }
}

/// Authentication token for HELLO or LOGON.
#[derive(Clone)]
pub struct AuthToken {
    /// Authentication scheme (e.g., "basic", "bearer")
    pub scheme: String,
    /// Principal (username)
    pub principal: Option<String>,
    /// Credentials (password)
    pub credentials: Option<String>,
    /// Realm
    pub realm: Option<String>,
    /// Additional parameters
    pub parameters: HashMap<String, PackStreamValue>,
}

impl AuthToken {
    /// Create a basic auth token.
    pub fn basic(principal: &str, credentials: &str) -> Self {
        Self {
            scheme: "basic".to_string(),
            principal: Some(principal.to_string()),
            credentials: Some(credentials.to_string()),
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// Create a bearer token.
    pub fn bearer(token: &str) -> Self {
        Self {
            scheme: "bearer".to_string(),
            principal: None,
            credentials: Some(token.to_string()),
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// Create an anonymous auth token (no auth).
    pub fn none() -> Self {
        Self {
            scheme: "none".to_string(),
            principal: None,
            credentials: None,
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// Convert to PackStream map.
    pub fn to_map(&self) -> HashMap<String, PackStreamValue> {
        let mut map = self.parameters.clone();
        map.insert("scheme".to_string(), PackStreamValue::String(self.scheme.clone()));
        if let Some(ref p) = self.principal {
            map.insert("principal".to_string(), PackStreamValue::String(p.clone()));
        }
        if let Some(ref c) = self.credentials {
            map.insert("credentials".to_string(), PackStreamValue::String(c.clone()));
        }
        if let Some(ref r) = self.realm {
            map.insert("realm".to_string(), PackStreamValue::String(r.clone()));
        }
        map
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("scheme", &self.scheme)
            .field("principal", &self.principal)
            .field("credentials", &self.credentials.as_ref().map(|_| "******"))
            .finish()
    }
}

/// Server notification filtering, sent from 5.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationsConfig {
    /// Ask the server not to send notifications at all.
    Disabled,
    /// Only send notifications at or above a severity, minus some categories.
    Filter {
        /// Lowest severity to report; `None` keeps the server default
        minimum_severity: Option<NotificationSeverity>,
        /// Categories the server should not report
        disabled_categories: Vec<String>,
    },
}

impl NotificationsConfig {
    fn write_into(&self, extra: &mut HashMap<String, PackStreamValue>) {
        match self {
            NotificationsConfig::Disabled => {
                extra.insert("notifications_minimum_severity".into(), "OFF".into());
            }
            NotificationsConfig::Filter {
                minimum_severity,
                disabled_categories,
            } => {
                if let Some(severity) = minimum_severity {
                    extra.insert(
                        "notifications_minimum_severity".into(),
                        severity.as_str().into(),
                    );
                }
                if !disabled_categories.is_empty() {
                    extra.insert(
                        "notifications_disabled_categories".into(),
                        PackStreamValue::from(disabled_categories.clone()),
                    );
                }
            }
        }
    }
}

/// Transaction settings shared by BEGIN and auto-commit RUN.
#[derive(Debug, Clone, Default)]
pub struct TransactionExtra {
    /// Bookmarks the server must have applied first
    pub bookmarks: Vec<String>,
    /// Server-side transaction timeout
    pub tx_timeout: Option<Duration>,
    /// Metadata attached to the transaction
    pub tx_metadata: HashMap<String, PackStreamValue>,
    /// Read or write
    pub mode: AccessMode,
    /// Target database, 4.0 and later
    pub database: Option<String>,
    /// User to impersonate, 4.4 and later
    pub impersonated_user: Option<String>,
    /// Notification filtering, 5.2 and later
    pub notifications: Option<NotificationsConfig>,
}

impl TransactionExtra {
    /// Render the extra map for `version`. Settings the version predates are left out.
    pub fn to_map(&self, version: ProtocolVersion) -> HashMap<String, PackStreamValue> {
        let mut extra = HashMap::new();
        if !self.bookmarks.is_empty() {
            extra.insert("bookmarks".into(), PackStreamValue::from(self.bookmarks.clone()));
        }
        if let Some(timeout) = self.tx_timeout {
            let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
            extra.insert("tx_timeout".into(), PackStreamValue::Integer(millis));
        }
        if !self.tx_metadata.is_empty() {
            extra.insert("tx_metadata".into(), PackStreamValue::Map(self.tx_metadata.clone()));
        }
        if self.mode == AccessMode::Read {
            extra.insert("mode".into(), AccessMode::Read.as_str().into());
        }
        if version >= ProtocolVersion::V4_0 {
            if let Some(ref db) = self.database {
                extra.insert("db".into(), db.as_str().into());
            }
        }
        if version >= ProtocolVersion::V4_4 {
            if let Some(ref user) = self.impersonated_user {
                extra.insert("imp_user".into(), user.as_str().into());
            }
        }
        if version >= ProtocolVersion::V5_2 {
            if let Some(ref config) = self.notifications {
                config.write_into(&mut extra);
            }
        }
        extra
    }
}

/// All Bolt request messages.
#[derive(Debug, Clone)]
pub enum BoltRequest {
    /// HELLO - Initialize connection
    Hello(HelloMessage),
    /// LOGON - Authenticate (5.1+)
    Logon(LogonMessage),
    /// GOODBYE - Close connection gracefully
    Goodbye,
    /// RESET - Reset connection state
    Reset,
    /// RUN - Execute a query
    Run(RunMessage),
    /// PULL - Pull results
    Pull(PullMessage),
    /// DISCARD - Discard results
    Discard(PullMessage),
    /// BEGIN - Start transaction
    Begin(BeginMessage),
    /// COMMIT - Commit transaction
    Commit,
    /// ROLLBACK - Rollback transaction
    Rollback,
    /// ROUTE - Request routing information (4.3+)
    Route(RouteMessage),
}

impl BoltRequest {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltRequest::Hello(_) => tag::HELLO,
            BoltRequest::Logon(_) => tag::LOGON,
            BoltRequest::Goodbye => tag::GOODBYE,
            BoltRequest::Reset => tag::RESET,
            BoltRequest::Run(_) => tag::RUN,
            BoltRequest::Pull(_) => tag::PULL,
            BoltRequest::Discard(_) => tag::DISCARD,
            BoltRequest::Begin(_) => tag::BEGIN,
            BoltRequest::Commit => tag::COMMIT,
            BoltRequest::Rollback => tag::ROLLBACK,
            BoltRequest::Route(_) => tag::ROUTE,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltRequest::Hello(_) => "HELLO",
            BoltRequest::Logon(_) => "LOGON",
            BoltRequest::Goodbye => "GOODBYE",
            BoltRequest::Reset => "RESET",
            BoltRequest::Run(_) => "RUN",
            BoltRequest::Pull(_) => "PULL",
            BoltRequest::Discard(_) => "DISCARD",
            BoltRequest::Begin(_) => "BEGIN",
            BoltRequest::Commit => "COMMIT",
            BoltRequest::Rollback => "ROLLBACK",
            BoltRequest::Route(_) => "ROUTE",
        }
    }

    /// Render as a PackStream structure for `version`.
    pub fn to_structure(&self, version: ProtocolVersion) -> PackStreamStructure {
        match self {
            BoltRequest::Hello(msg) => msg.to_structure(version),
            BoltRequest::Logon(msg) => msg.to_structure(),
            BoltRequest::Goodbye => PackStreamStructure::new(tag::GOODBYE, vec![]),
            BoltRequest::Reset => PackStreamStructure::new(tag::RESET, vec![]),
            BoltRequest::Run(msg) => msg.to_structure(version),
            BoltRequest::Pull(msg) => msg.to_structure(tag::PULL, version),
            BoltRequest::Discard(msg) => msg.to_structure(tag::DISCARD, version),
            BoltRequest::Begin(msg) => msg.to_structure(version),
            BoltRequest::Commit => PackStreamStructure::new(tag::COMMIT, vec![]),
            BoltRequest::Rollback => PackStreamStructure::new(tag::ROLLBACK, vec![]),
            BoltRequest::Route(msg) => msg.to_structure(version),
        }
    }
}

impl fmt::Display for BoltRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltRequest::Hello(msg) => write!(f, "HELLO {{user_agent: {:?}}}", msg.user_agent),
            BoltRequest::Logon(msg) => write!(f, "LOGON {{scheme: {:?}}}", msg.auth.scheme),
            BoltRequest::Run(msg) => write!(f, "RUN {:?} {:?}", msg.query, msg.parameters),
            BoltRequest::Pull(msg) | BoltRequest::Discard(msg) => {
                write!(f, "{} {{n: {}, qid: {}}}", self.name(), msg.n, msg.qid)
            }
            BoltRequest::Route(msg) => write!(f, "ROUTE {:?} {:?}", msg.routing, msg.database),
            _ => f.write_str(self.name()),
        }
    }
}

/// HELLO message - Initialize connection.
#[derive(Debug, Clone)]
pub struct HelloMessage {
    /// User agent string
    pub user_agent: String,
    /// Authentication token, carried in HELLO before 5.1
    pub auth: Option<AuthToken>,
    /// Routing context; present only for routing drivers
    pub routing: Option<HashMap<String, String>>,
    /// Notification filtering (5.2+)
    pub notifications: Option<NotificationsConfig>,
}

impl HelloMessage {
    /// Create a new HELLO message.
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            auth: None,
            routing: None,
            notifications: None,
        }
    }

    /// Set authentication.
    pub fn with_auth(mut self, auth: AuthToken) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set routing context.
    pub fn with_routing(mut self, routing: Option<HashMap<String, String>>) -> Self {
        self.routing = routing;
        self
    }

    /// Set notification filtering.
    pub fn with_notifications(mut self, notifications: Option<NotificationsConfig>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self, version: ProtocolVersion) -> PackStreamStructure {
        let mut extra = HashMap::new();
        if version < ProtocolVersion::V5_1 {
            if let Some(ref auth) = self.auth {
                extra.extend(auth.to_map());
            }
        }
        extra.insert("user_agent".to_string(), self.user_agent.as_str().into());
        if let Some(ref routing) = self.routing {
            extra.insert("routing".to_string(), PackStreamValue::from(routing.clone()));
        }
        if version >= ProtocolVersion::V5_2 {
            if let Some(ref config) = self.notifications {
                config.write_into(&mut extra);
            }
        }
        PackStreamStructure::new(tag::HELLO, vec![PackStreamValue::Map(extra)])
    }
}

/// LOGON message - Authenticate (5.1+).
#[derive(Debug, Clone)]
pub struct LogonMessage {
    /// Authentication token
    pub auth: AuthToken,
}

impl LogonMessage {
    /// Create a LOGON message.
    pub fn new(auth: AuthToken) -> Self {
        Self { auth }
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(tag::LOGON, vec![PackStreamValue::Map(self.auth.to_map())])
    }
}

/// RUN message - Execute a query.
#[derive(Debug, Clone)]
pub struct RunMessage {
    /// Query string
    pub query: String,
    /// Query parameters
    pub parameters: HashMap<String, PackStreamValue>,
    /// Transaction settings; empty inside an explicit transaction
    pub extra: TransactionExtra,
}

impl RunMessage {
    /// Create a new RUN message.
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            parameters: HashMap::new(),
            extra: TransactionExtra::default(),
        }
    }

    /// Set query parameters.
    pub fn with_parameters(mut self, params: HashMap<String, PackStreamValue>) -> Self {
        self.parameters = params;
        self
    }

    /// Set transaction settings.
    pub fn with_extra(mut self, extra: TransactionExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self, version: ProtocolVersion) -> PackStreamStructure {
        PackStreamStructure::new(
            tag::RUN,
            vec![
                PackStreamValue::String(self.query.clone()),
                PackStreamValue::Map(self.parameters.clone()),
                PackStreamValue::Map(self.extra.to_map(version)),
            ],
        )
    }
}

/// PULL or DISCARD message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullMessage {
    /// Number of records ([`FETCH_ALL`] for all)
    pub n: i64,
    /// Query id ([`NO_QID`] for the last query)
    pub qid: i64,
}

impl PullMessage {
    /// All records of the last query.
    pub fn all() -> Self {
        Self::new(FETCH_ALL, NO_QID)
    }

    /// `n` records of query `qid`.
    pub fn new(n: i64, qid: i64) -> Self {
        Self { n, qid }
    }

    /// Convert to PackStream structure. Version 3 has no fields: it always
    /// streams everything (PULL_ALL / DISCARD_ALL).
    pub fn to_structure(&self, signature: u8, version: ProtocolVersion) -> PackStreamStructure {
        if version < ProtocolVersion::V4_0 {
            return PackStreamStructure::new(signature, vec![]);
        }
        let mut extra = HashMap::new();
        extra.insert("n".to_string(), PackStreamValue::Integer(self.n));
        if self.qid != NO_QID {
            extra.insert("qid".to_string(), PackStreamValue::Integer(self.qid));
        }
        PackStreamStructure::new(signature, vec![PackStreamValue::Map(extra)])
    }
}

/// BEGIN message - Start a transaction.
#[derive(Debug, Clone, Default)]
pub struct BeginMessage {
    /// Transaction settings
    pub extra: TransactionExtra,
}

impl BeginMessage {
    /// Create a BEGIN message.
    pub fn new(extra: TransactionExtra) -> Self {
        Self { extra }
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self, version: ProtocolVersion) -> PackStreamStructure {
        PackStreamStructure::new(tag::BEGIN, vec![PackStreamValue::Map(self.extra.to_map(version))])
    }
}

/// ROUTE message - Request routing information (4.3+).
#[derive(Debug, Clone, Default)]
pub struct RouteMessage {
    /// Routing context
    pub routing: HashMap<String, String>,
    /// Bookmarks the routing table must reflect
    pub bookmarks: Vec<String>,
    /// Database to route for; `None` asks for the home database
    pub database: Option<String>,
    /// User whose home database to resolve (4.4+)
    pub impersonated_user: Option<String>,
}

impl RouteMessage {
    /// Convert to PackStream structure.
    ///
    /// 4.3 sends the database as a bare third field; 4.4 and later wrap it
    /// in a map alongside the impersonated user.
    pub fn to_structure(&self, version: ProtocolVersion) -> PackStreamStructure {
        let third = if version >= ProtocolVersion::V4_4 {
            let mut extra = HashMap::new();
            if let Some(ref db) = self.database {
                extra.insert("db".to_string(), db.as_str().into());
            }
            if let Some(ref user) = self.impersonated_user {
                extra.insert("imp_user".to_string(), user.as_str().into());
            }
            PackStreamValue::Map(extra)
        } else {
            PackStreamValue::from(self.database.clone())
        };
        PackStreamStructure::new(
            tag::ROUTE,
            vec![
                PackStreamValue::from(self.routing.clone()),
                PackStreamValue::from(self.bookmarks.clone()),
                third,
            ],
        )
    }
}
