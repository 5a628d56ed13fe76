//! Bolt protocol metadata types.
//!
//! Typed views over the metadata maps carried by SUCCESS messages.

use std::collections::HashMap;

use crate::bolt::packstream::PackStreamValue;

/// Query statistics returned in SUCCESS after PULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Nodes created
    pub nodes_created: i64,
    /// Nodes deleted
    pub nodes_deleted: i64,
    /// Relationships created
    pub relationships_created: i64,
    /// Relationships deleted
    pub relationships_deleted: i64,
    /// Properties set
    pub properties_set: i64,
    /// Labels added
    pub labels_added: i64,
    /// Labels removed
    pub labels_removed: i64,
    /// Indexes added
    pub indexes_added: i64,
    /// Indexes removed
    pub indexes_removed: i64,
    /// Constraints added
    pub constraints_added: i64,
    /// Constraints removed
    pub constraints_removed: i64,
    /// System updates
    pub system_updates: i64,
    /// Contains system updates
    pub contains_system_updates: bool,
    /// Contains updates
    pub contains_updates: bool,
}

impl QueryStats {
    /// Check if there were any modifications.
    pub fn has_updates(&self) -> bool {
        self.contains_updates
            || self.nodes_created > 0
            || self.nodes_deleted > 0
            || self.relationships_created > 0
            || self.relationships_deleted > 0
            || self.properties_set > 0
            || self.labels_added > 0
            || self.labels_removed > 0
            || self.indexes_added > 0
            || self.indexes_removed > 0
            || self.constraints_added > 0
            || self.constraints_removed > 0
    }

    /// Parse from the `stats` map. Missing counters are zero.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Self {
        let count = |key: &str| map.get(key).and_then(|v| v.as_int()).unwrap_or(0);
        let system_updates = count("system-updates");
        Self {
            nodes_created: count("nodes-created"),
            nodes_deleted: count("nodes-deleted"),
            relationships_created: count("relationships-created"),
            relationships_deleted: count("relationships-deleted"),
            properties_set: count("properties-set"),
            labels_added: count("labels-added"),
            labels_removed: count("labels-removed"),
            indexes_added: count("indexes-added"),
            indexes_removed: count("indexes-removed"),
            constraints_added: count("constraints-added"),
            constraints_removed: count("constraints-removed"),
            system_updates,
            contains_system_updates: map
                .get("contains-system-updates")
                .and_then(|v| v.as_bool())
                .unwrap_or(system_updates > 0),
            contains_updates: map
                .get("contains-updates")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }
}

/// Notification returned in SUCCESS metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Notification code
    pub code: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Severity
    pub severity: NotificationSeverity,
    /// Category, when the server reports one
    pub category: Option<String>,
    /// Position in query
    pub position: Option<NotificationPosition>,
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    /// Warning
    Warning,
    /// Information
    Information,
}

impl NotificationSeverity {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSeverity::Warning => "WARNING",
            NotificationSeverity::Information => "INFORMATION",
        }
    }

    /// Parse a wire name. Unknown severities read as information.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("WARNING") {
            NotificationSeverity::Warning
        } else {
            NotificationSeverity::Information
        }
    }
}

/// Position in query for notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPosition {
    /// Line number (1-based)
    pub line: i64,
    /// Column number (1-based)
    pub column: i64,
    /// Offset from start
    pub offset: i64,
}

impl Notification {
    /// Parse from PackStream map. A notification without a code is dropped.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Option<Self> {
        let text = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let position = map.get("position").and_then(|v| v.as_map()).and_then(|pos| {
            Some(NotificationPosition {
                line: pos.get("line").and_then(|v| v.as_int())?,
                column: pos.get("column").and_then(|v| v.as_int())?,
                offset: pos.get("offset").and_then(|v| v.as_int()).unwrap_or(0),
            })
        });

        Some(Self {
            code: text("code")?,
            title: text("title").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            severity: text("severity")
                .map(|s| NotificationSeverity::parse(&s))
                .unwrap_or(NotificationSeverity::Information),
            category: text("category"),
            position,
        })
    }

    /// Parse the `notifications` list of a SUCCESS message.
    pub fn list_from_value(value: &PackStreamValue) -> Vec<Self> {
        value
            .as_list()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_map().and_then(Self::from_map))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Server role in a routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    /// Accepts ROUTE requests
    Route,
    /// Accepts reads
    Read,
    /// Accepts writes
    Write,
}

impl ServerRole {
    /// Parse a role name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ROUTE" => Some(ServerRole::Route),
            "READ" => Some(ServerRole::Read),
            "WRITE" => Some(ServerRole::Write),
            _ => None,
        }
    }
}

/// Typed view of a routing table answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    /// Time to live in seconds
    pub ttl: i64,
    /// Database the table applies to
    pub db: Option<String>,
    /// Addresses per role
    pub servers: HashMap<ServerRole, Vec<String>>,
}

impl RoutingTable {
    /// Parse a routing table map (`ttl`, `servers`, `db`).
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Option<Self> {
        let ttl = map.get("ttl").and_then(|v| v.as_int())?;
        let mut servers: HashMap<ServerRole, Vec<String>> = HashMap::new();
        for entry in map.get("servers").and_then(|v| v.as_list())? {
            let entry = entry.as_map()?;
            let role = entry.get("role").and_then(|v| v.as_str()).and_then(ServerRole::parse)?;
            let addresses = entry.get("addresses").and_then(|v| v.as_string_list())?;
            servers.entry(role).or_default().extend(addresses);
        }
        Some(Self {
            ttl,
            db: map.get("db").and_then(|v| v.as_str()).map(str::to_string),
            servers,
        })
    }

    /// Addresses serving `role`.
    pub fn servers(&self, role: ServerRole) -> &[String] {
        self.servers.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, PackStreamValue)>) -> HashMap<String, PackStreamValue> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_query_stats_from_map() {
        let stats = QueryStats::from_map(&map(vec![
            ("nodes-created", 2i64.into()),
            ("properties-set", 4i64.into()),
            ("contains-updates", true.into()),
        ]));
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.properties_set, 4);
        assert_eq!(stats.relationships_created, 0);
        assert!(stats.has_updates());
        assert!(!QueryStats::default().has_updates());
    }

    #[test]
    fn test_system_updates_imply_flag() {
        let stats = QueryStats::from_map(&map(vec![("system-updates", 1i64.into())]));
        assert!(stats.contains_system_updates);
        assert!(!stats.has_updates());
    }

    #[test]
    fn test_notification_from_map() {
        let position = map(vec![("line", 1i64.into()), ("column", 8i64.into())]);
        let raw = map(vec![
            ("code", "Neo.ClientNotification.Statement.CartesianProduct".into()),
            ("title", "Cartesian product".into()),
            ("severity", "warning".into()),
            ("position", PackStreamValue::Map(position)),
        ]);
        let notification = Notification::from_map(&raw).unwrap();
        assert_eq!(notification.severity, NotificationSeverity::Warning);
        assert_eq!(notification.position.unwrap().column, 8);
        assert_eq!(notification.position.unwrap().offset, 0);
        assert!(notification.category.is_none());

        assert!(Notification::from_map(&map(vec![("title", "x".into())])).is_none());
    }

    #[test]
    fn test_notification_list() {
        let value = PackStreamValue::List(vec![
            PackStreamValue::Map(map(vec![("code", "A".into())])),
            PackStreamValue::Integer(1),
        ]);
        let list = Notification::list_from_value(&value);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].code, "A");
    }

    #[test]
    fn test_routing_table_from_map() {
        let server = |role: &str, addr: &str| {
            PackStreamValue::Map(map(vec![
                ("role", role.into()),
                ("addresses", vec![addr.to_string()].into()),
            ]))
        };
        let raw = map(vec![
            ("ttl", 300i64.into()),
            ("db", "neo4j".into()),
            (
                "servers",
                PackStreamValue::List(vec![
                    server("ROUTE", "a:7687"),
                    server("READ", "b:7687"),
                    server("WRITE", "c:7687"),
                ]),
            ),
        ]);
        let table = RoutingTable::from_map(&raw).unwrap();
        assert_eq!(table.ttl, 300);
        assert_eq!(table.db.as_deref(), Some("neo4j"));
        assert_eq!(table.servers(ServerRole::Read), ["b:7687".to_string()]);
        assert!(RoutingTable::from_map(&HashMap::new()).is_none());
    }
}
