//! Structure signatures, the per-version [`StructTable`], and typed views over
//! the graph and temporal shapes.

use std::collections::HashMap;

use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Structure signatures.
pub mod tag {
    pub const NODE: u8 = b'N';
    pub const RELATIONSHIP: u8 = b'R';
    pub const UNBOUND_RELATIONSHIP: u8 = b'r';
    pub const PATH: u8 = b'P';
    pub const DATE: u8 = b'D';
    pub const TIME: u8 = b'T';
    pub const LOCAL_TIME: u8 = b't';
    /// Offset date-time with local seconds, before 5.0.
    pub const LEGACY_DATE_TIME: u8 = b'F';
    /// Zoned date-time with local seconds, before 5.0.
    pub const LEGACY_DATE_TIME_ZONE_ID: u8 = b'f';
    /// Offset date-time with UTC seconds, 5.0 and later.
    pub const DATE_TIME: u8 = b'I';
    /// Zoned date-time with UTC seconds, 5.0 and later.
    pub const DATE_TIME_ZONE_ID: u8 = b'i';
    pub const LOCAL_DATE_TIME: u8 = b'd';
    pub const DURATION: u8 = b'E';
    pub const POINT_2D: u8 = b'X';
    pub const POINT_3D: u8 = b'Y';
}

/// Validates a decoded structure and produces the value handed to callers.
pub type StructHandler = fn(PackStreamStructure) -> Result<PackStreamValue, PackStreamError>;

/// Immutable map from signature byte to [`StructHandler`].
///
/// Built once per protocol version and shared by every decode on a
/// connection. Signatures absent from the table are rejected.
#[derive(Debug, Clone, Default)]
pub struct StructTable {
    handlers: HashMap<u8, StructHandler>,
}

impl StructTable {
    /// A table with no handlers. Any structure value fails to decode.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Shapes spoken by 3.x and 4.x servers.
    pub fn legacy() -> Self {
        Self::empty()
            .with_handler(tag::NODE, node_legacy)
            .with_handler(tag::RELATIONSHIP, relationship_legacy)
            .with_handler(tag::UNBOUND_RELATIONSHIP, unbound_legacy)
            .with_handler(tag::LEGACY_DATE_TIME, date_time)
            .with_handler(tag::LEGACY_DATE_TIME_ZONE_ID, date_time)
            .with_common()
    }

    /// Shapes spoken by 5.x servers: element ids and UTC date-times.
    pub fn v5() -> Self {
        Self::empty()
            .with_handler(tag::NODE, node_v5)
            .with_handler(tag::RELATIONSHIP, relationship_v5)
            .with_handler(tag::UNBOUND_RELATIONSHIP, unbound_v5)
            .with_handler(tag::DATE_TIME, date_time)
            .with_handler(tag::DATE_TIME_ZONE_ID, date_time)
            .with_common()
    }

    fn with_common(self) -> Self {
        self.with_handler(tag::PATH, path)
            .with_handler(tag::DATE, date)
            .with_handler(tag::TIME, time)
            .with_handler(tag::LOCAL_TIME, local_time)
            .with_handler(tag::LOCAL_DATE_TIME, local_date_time)
            .with_handler(tag::DURATION, duration)
            .with_handler(tag::POINT_2D, point_2d)
            .with_handler(tag::POINT_3D, point_3d)
    }

    /// Register (or replace) the handler for `tag`.
    pub fn with_handler(mut self, tag: u8, handler: StructHandler) -> Self {
        self.handlers.insert(tag, handler);
        self
    }

    /// Whether `tag` has a handler.
    pub fn contains(&self, tag: u8) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// Run the handler registered for the structure's signature.
    pub fn resolve(&self, s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
        match self.handlers.get(&s.tag) {
            Some(handler) => handler(s),
            None => Err(PackStreamError::UnknownStructure(s.tag)),
        }
    }
}

fn expect_fields(
    s: PackStreamStructure,
    name: &str,
    expected: usize,
) -> Result<PackStreamValue, PackStreamError> {
    if s.fields.len() != expected {
        return Err(PackStreamError::InvalidStructure(format!(
            "{} expects {} fields, got {}",
            name,
            expected,
            s.fields.len()
        )));
    }
    Ok(PackStreamValue::Structure(s))
}

fn node_legacy(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Node", 3)
}

fn node_v5(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Node", 4)
}

fn relationship_legacy(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Relationship", 5)
}

fn relationship_v5(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Relationship", 8)
}

fn unbound_legacy(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "UnboundRelationship", 3)
}

fn unbound_v5(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "UnboundRelationship", 4)
}

fn path(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Path", 3)
}

fn date(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Date", 1)
}

fn time(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Time", 2)
}

fn local_time(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "LocalTime", 1)
}

fn date_time(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "DateTime", 3)
}

fn local_date_time(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "LocalDateTime", 2)
}

fn duration(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Duration", 4)
}

fn point_2d(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Point2D", 3)
}

fn point_3d(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
    expect_fields(s, "Point3D", 4)
}

fn expect_tag<'a>(
    value: &'a PackStreamValue,
    expected: u8,
    name: &str,
) -> Result<&'a [PackStreamValue], PackStreamError> {
    let s = value
        .as_structure()
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("expected {} structure", name)))?;
    if s.tag != expected {
        return Err(PackStreamError::InvalidStructure(format!(
            "expected {} tag 0x{:02X}, got 0x{:02X}",
            name, expected, s.tag
        )));
    }
    Ok(&s.fields)
}

fn int_field(fields: &[PackStreamValue], index: usize, what: &str) -> Result<i64, PackStreamError> {
    fields
        .get(index)
        .and_then(PackStreamValue::as_int)
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{} must be an integer", what)))
}

fn float_field(fields: &[PackStreamValue], index: usize, what: &str) -> Result<f64, PackStreamError> {
    fields
        .get(index)
        .and_then(PackStreamValue::as_float)
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{} must be a float", what)))
}

fn str_field(fields: &[PackStreamValue], index: usize, what: &str) -> Result<String, PackStreamError> {
    fields
        .get(index)
        .and_then(PackStreamValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{} must be a string", what)))
}

fn map_field(
    fields: &[PackStreamValue],
    index: usize,
    what: &str,
) -> Result<HashMap<String, PackStreamValue>, PackStreamError> {
    fields
        .get(index)
        .and_then(PackStreamValue::as_map)
        .cloned()
        .ok_or_else(|| PackStreamError::InvalidStructure(format!("{} must be a map", what)))
}

/// A node.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStreamNode {
    /// Legacy numeric id
    pub id: i64,
    /// Labels
    pub labels: Vec<String>,
    /// Properties
    pub properties: HashMap<String, PackStreamValue>,
    /// Element id, present from 5.0
    pub element_id: Option<String>,
}

impl PackStreamNode {
    /// Create a node in the pre-5.0 shape.
    pub fn new(id: i64, labels: Vec<String>, properties: HashMap<String, PackStreamValue>) -> Self {
        Self {
            id,
            labels,
            properties,
            element_id: None,
        }
    }

    /// Attach an element id, switching to the 5.0 shape.
    pub fn with_element_id(mut self, element_id: String) -> Self {
        self.element_id = Some(element_id);
        self
    }

    /// Convert to a structure value.
    pub fn to_value(&self) -> PackStreamValue {
        let mut fields = vec![
            PackStreamValue::Integer(self.id),
            PackStreamValue::from(self.labels.clone()),
            PackStreamValue::Map(self.properties.clone()),
        ];
        if let Some(element_id) = &self.element_id {
            fields.push(PackStreamValue::String(element_id.clone()));
        }
        PackStreamValue::Structure(PackStreamStructure::new(tag::NODE, fields))
    }

    /// Read a node out of a decoded value.
    pub fn from_value(value: &PackStreamValue) -> Result<Self, PackStreamError> {
        let fields = expect_tag(value, tag::NODE, "Node")?;
        let labels = fields
            .get(1)
            .and_then(PackStreamValue::as_string_list)
            .ok_or_else(|| PackStreamError::InvalidStructure("Node labels must be a list".into()))?;
        Ok(Self {
            id: int_field(fields, 0, "Node id")?,
            labels,
            properties: map_field(fields, 2, "Node properties")?,
            element_id: fields.get(3).and_then(PackStreamValue::as_str).map(str::to_string),
        })
    }
}

/// A relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStreamRelationship {
    /// Legacy numeric id
    pub id: i64,
    /// Start node id
    pub start_node_id: i64,
    /// End node id
    pub end_node_id: i64,
    /// Relationship type
    pub rel_type: String,
    /// Properties
    pub properties: HashMap<String, PackStreamValue>,
    /// Element ids of the relationship, start node and end node, present from 5.0
    pub element_ids: Option<(String, String, String)>,
}

impl PackStreamRelationship {
    /// Create a relationship in the pre-5.0 shape.
    pub fn new(
        id: i64,
        start_node_id: i64,
        end_node_id: i64,
        rel_type: String,
        properties: HashMap<String, PackStreamValue>,
    ) -> Self {
        Self {
            id,
            start_node_id,
            end_node_id,
            rel_type,
            properties,
            element_ids: None,
        }
    }

    /// Attach element ids, switching to the 5.0 shape.
    pub fn with_element_ids(mut self, id: String, start: String, end: String) -> Self {
        self.element_ids = Some((id, start, end));
        self
    }

    /// Convert to a structure value.
    pub fn to_value(&self) -> PackStreamValue {
        let mut fields = vec![
            PackStreamValue::Integer(self.id),
            PackStreamValue::Integer(self.start_node_id),
            PackStreamValue::Integer(self.end_node_id),
            PackStreamValue::String(self.rel_type.clone()),
            PackStreamValue::Map(self.properties.clone()),
        ];
        if let Some((id, start, end)) = &self.element_ids {
            fields.push(PackStreamValue::String(id.clone()));
            fields.push(PackStreamValue::String(start.clone()));
            fields.push(PackStreamValue::String(end.clone()));
        }
        PackStreamValue::Structure(PackStreamStructure::new(tag::RELATIONSHIP, fields))
    }

    /// Read a relationship out of a decoded value.
    pub fn from_value(value: &PackStreamValue) -> Result<Self, PackStreamError> {
        let fields = expect_tag(value, tag::RELATIONSHIP, "Relationship")?;
        let element_ids = if fields.len() >= 8 {
            Some((
                str_field(fields, 5, "Relationship element id")?,
                str_field(fields, 6, "Start node element id")?,
                str_field(fields, 7, "End node element id")?,
            ))
        } else {
            None
        };
        Ok(Self {
            id: int_field(fields, 0, "Relationship id")?,
            start_node_id: int_field(fields, 1, "Start node id")?,
            end_node_id: int_field(fields, 2, "End node id")?,
            rel_type: str_field(fields, 3, "Relationship type")?,
            properties: map_field(fields, 4, "Relationship properties")?,
            element_ids,
        })
    }
}

/// A date as days since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStreamDate {
    /// Days since 1970-01-01
    pub days: i64,
}

impl PackStreamDate {
    /// Create a date.
    pub fn new(days: i64) -> Self {
        Self { days }
    }

    /// Convert to a structure value.
    pub fn to_value(&self) -> PackStreamValue {
        PackStreamValue::Structure(PackStreamStructure::new(
            tag::DATE,
            vec![PackStreamValue::Integer(self.days)],
        ))
    }

    /// Read a date out of a decoded value.
    pub fn from_value(value: &PackStreamValue) -> Result<Self, PackStreamError> {
        let fields = expect_tag(value, tag::DATE, "Date")?;
        Ok(Self::new(int_field(fields, 0, "Date days")?))
    }
}

/// A duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStreamDuration {
    /// Months
    pub months: i64,
    /// Days
    pub days: i64,
    /// Seconds
    pub seconds: i64,
    /// Nanoseconds
    pub nanoseconds: i64,
}

impl PackStreamDuration {
    /// Create a duration.
    pub fn new(months: i64, days: i64, seconds: i64, nanoseconds: i64) -> Self {
        Self {
            months,
            days,
            seconds,
            nanoseconds,
        }
    }

    /// Convert to a structure value.
    pub fn to_value(&self) -> PackStreamValue {
        PackStreamValue::Structure(PackStreamStructure::new(
            tag::DURATION,
            vec![
                PackStreamValue::Integer(self.months),
                PackStreamValue::Integer(self.days),
                PackStreamValue::Integer(self.seconds),
                PackStreamValue::Integer(self.nanoseconds),
            ],
        ))
    }

    /// Read a duration out of a decoded value.
    pub fn from_value(value: &PackStreamValue) -> Result<Self, PackStreamError> {
        let fields = expect_tag(value, tag::DURATION, "Duration")?;
        Ok(Self::new(
            int_field(fields, 0, "Duration months")?,
            int_field(fields, 1, "Duration days")?,
            int_field(fields, 2, "Duration seconds")?,
            int_field(fields, 3, "Duration nanoseconds")?,
        ))
    }
}

/// A 2D or 3D spatial point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackStreamPoint {
    /// Spatial reference id
    pub srid: i64,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate, for 3D points
    pub z: Option<f64>,
}

impl PackStreamPoint {
    /// Create a 2D point.
    pub fn new_2d(srid: i64, x: f64, y: f64) -> Self {
        Self { srid, x, y, z: None }
    }

    /// Create a 3D point.
    pub fn new_3d(srid: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            srid,
            x,
            y,
            z: Some(z),
        }
    }

    /// Convert to a structure value.
    pub fn to_value(&self) -> PackStreamValue {
        let mut fields = vec![
            PackStreamValue::Integer(self.srid),
            PackStreamValue::Float(self.x),
            PackStreamValue::Float(self.y),
        ];
        let signature = match self.z {
            Some(z) => {
                fields.push(PackStreamValue::Float(z));
                tag::POINT_3D
            }
            None => tag::POINT_2D,
        };
        PackStreamValue::Structure(PackStreamStructure::new(signature, fields))
    }

    /// Read a point out of a decoded value.
    pub fn from_value(value: &PackStreamValue) -> Result<Self, PackStreamError> {
        let is_3d = value.as_structure().map(|s| s.tag) == Some(tag::POINT_3D);
        let fields = if is_3d {
            expect_tag(value, tag::POINT_3D, "Point3D")?
        } else {
            expect_tag(value, tag::POINT_2D, "Point2D")?
        };
        Ok(Self {
            srid: int_field(fields, 0, "Point srid")?,
            x: float_field(fields, 1, "Point x")?,
            y: float_field(fields, 2, "Point y")?,
            z: if is_3d { Some(float_field(fields, 3, "Point z")?) } else { None },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> PackStreamNode {
        let mut props = HashMap::new();
        props.insert("name".to_string(), PackStreamValue::String("Alice".into()));
        PackStreamNode::new(1, vec!["Person".to_string()], props)
    }

    #[test]
    fn test_node_shape_depends_on_table() {
        let legacy = person().to_value();
        let modern = person().with_element_id("4:abc:1".into()).to_value();

        let legacy_struct = legacy.as_structure().unwrap().clone();
        let modern_struct = modern.as_structure().unwrap().clone();

        assert!(StructTable::legacy().resolve(legacy_struct.clone()).is_ok());
        assert!(StructTable::v5().resolve(modern_struct.clone()).is_ok());
        assert!(matches!(
            StructTable::v5().resolve(legacy_struct),
            Err(PackStreamError::InvalidStructure(_))
        ));
        assert!(matches!(
            StructTable::legacy().resolve(modern_struct),
            Err(PackStreamError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_node_from_value() {
        let node = person().with_element_id("4:abc:1".into());
        let parsed = PackStreamNode::from_value(&node.to_value()).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_from_value_checks_tag() {
        let rel = PackStreamRelationship::new(7, 1, 2, "KNOWS".into(), HashMap::new());
        let err = PackStreamNode::from_value(&rel.to_value()).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidStructure(_)));
        assert!(PackStreamNode::from_value(&PackStreamValue::Null).is_err());
    }

    #[test]
    fn test_relationship_from_value() {
        let rel = PackStreamRelationship::new(7, 1, 2, "KNOWS".into(), HashMap::new())
            .with_element_ids("5:x:7".into(), "4:x:1".into(), "4:x:2".into());
        let value = rel.to_value();
        assert_eq!(value.as_structure().unwrap().len(), 8);
        assert_eq!(PackStreamRelationship::from_value(&value).unwrap(), rel);

        let legacy = PackStreamRelationship::new(7, 1, 2, "KNOWS".into(), HashMap::new());
        assert_eq!(legacy.to_value().as_structure().unwrap().len(), 5);
    }

    #[test]
    fn test_date_time_tags_per_version() {
        let utc = PackStreamStructure::new(
            tag::DATE_TIME,
            vec![0i64.into(), 0i64.into(), 3600i64.into()],
        );
        let local = PackStreamStructure::new(tag::LEGACY_DATE_TIME, utc.fields.clone());

        assert!(StructTable::v5().resolve(utc.clone()).is_ok());
        assert_eq!(
            StructTable::legacy().resolve(utc),
            Err(PackStreamError::UnknownStructure(tag::DATE_TIME))
        );
        assert!(StructTable::legacy().resolve(local.clone()).is_ok());
        assert_eq!(
            StructTable::v5().resolve(local),
            Err(PackStreamError::UnknownStructure(tag::LEGACY_DATE_TIME))
        );
    }

    #[test]
    fn test_custom_handler() {
        fn passthrough(s: PackStreamStructure) -> Result<PackStreamValue, PackStreamError> {
            Ok(PackStreamValue::Structure(s))
        }
        let table = StructTable::empty().with_handler(0x01, passthrough);
        assert!(table.contains(0x01));
        assert!(!table.contains(tag::NODE));
        assert!(table.resolve(PackStreamStructure::new(0x01, vec![])).is_ok());
    }

    #[test]
    fn test_temporal_helpers() {
        let date = PackStreamDate::new(18628);
        assert_eq!(PackStreamDate::from_value(&date.to_value()).unwrap(), date);

        let duration = PackStreamDuration::new(14, 16, 12, 0);
        assert_eq!(PackStreamDuration::from_value(&duration.to_value()).unwrap(), duration);

        let err = PackStreamDate::from_value(&duration.to_value()).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidStructure(_)));
    }

    #[test]
    fn test_points() {
        let p2 = PackStreamPoint::new_2d(7203, 1.5, 2.5);
        let p3 = PackStreamPoint::new_3d(4979, 1.0, 2.0, 3.0);
        assert_eq!(p2.to_value().as_structure().unwrap().tag, tag::POINT_2D);
        assert_eq!(p3.to_value().as_structure().unwrap().tag, tag::POINT_3D);
        assert_eq!(PackStreamPoint::from_value(&p2.to_value()).unwrap(), p2);
        assert_eq!(PackStreamPoint::from_value(&p3.to_value()).unwrap(), p3);
    }
}
