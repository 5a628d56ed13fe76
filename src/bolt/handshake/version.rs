//! Bolt protocol version definitions.

use std::fmt;

use super::VersionError;

/// Raw handshake answer of a server speaking HTTP ("HTTP" in ASCII).
pub const HTTP_MAGIC: u32 = 1213486160;

/// A Bolt protocol version.
///
/// On the wire a version occupies the low two bytes of a big-endian `u32`,
/// minor first: `packed = minor << 8 | major`. Range proposals additionally
/// carry the number of older minors in the third byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion {
    major: u8,
    minor: u8,
}

impl ProtocolVersion {
    /// "No version": the server rejected every proposal.
    pub const ZERO: Self = Self::new(0, 0);
    /// Bolt 3.0
    pub const V3_0: Self = Self::new(3, 0);
    /// Bolt 4.0, multi-database
    pub const V4_0: Self = Self::new(4, 0);
    /// Bolt 4.1
    pub const V4_1: Self = Self::new(4, 1);
    /// Bolt 4.2
    pub const V4_2: Self = Self::new(4, 2);
    /// Bolt 4.3, ROUTE message
    pub const V4_3: Self = Self::new(4, 3);
    /// Bolt 4.4, impersonation
    pub const V4_4: Self = Self::new(4, 4);
    /// Bolt 5.0, element ids and UTC date-times
    pub const V5_0: Self = Self::new(5, 0);
    /// Bolt 5.1, LOGON
    pub const V5_1: Self = Self::new(5, 1);
    /// Bolt 5.2, notification filters
    pub const V5_2: Self = Self::new(5, 2);

    /// Every version this crate speaks, newest first.
    pub const SUPPORTED: [Self; 9] = [
        Self::V5_2,
        Self::V5_1,
        Self::V5_0,
        Self::V4_4,
        Self::V4_3,
        Self::V4_2,
        Self::V4_1,
        Self::V4_0,
        Self::V3_0,
    ];

    /// Create a version.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Major version.
    pub fn major(self) -> u8 {
        self.major
    }

    /// Minor version.
    pub fn minor(self) -> u8 {
        self.minor
    }

    /// Whether this crate speaks `self`.
    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    /// Wire form of a single version.
    pub fn pack(self) -> u32 {
        (self.minor as u32) << 8 | self.major as u32
    }

    /// Wire form of the range `min..=self`.
    pub fn pack_range(self, min: ProtocolVersion) -> Result<u32, VersionError> {
        if min.major != self.major || min > self {
            return Err(VersionError::InvalidRange { min, max: self });
        }
        Ok(((self.minor - min.minor) as u32) << 16 | self.pack())
    }

    /// Parse a server's handshake answer.
    pub fn from_packed(raw: u32) -> Result<Self, VersionError> {
        if raw == HTTP_MAGIC {
            return Err(VersionError::HttpResponse);
        }
        if raw > 0xFFFF {
            return Err(VersionError::OutOfRange(raw));
        }
        Ok(Self::new((raw & 0xFF) as u8, (raw >> 8 & 0xFF) as u8))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack() {
        assert_eq!(ProtocolVersion::V4_1.pack(), 260);
        assert_eq!(ProtocolVersion::V3_0.pack(), 3);
        assert_eq!(ProtocolVersion::V5_2.pack(), 0x0205);
    }

    #[test]
    fn test_from_packed() {
        assert_eq!(ProtocolVersion::from_packed(260).unwrap(), ProtocolVersion::V4_1);
        assert_eq!(ProtocolVersion::from_packed(0).unwrap(), ProtocolVersion::ZERO);
        assert_eq!(
            ProtocolVersion::from_packed(HTTP_MAGIC),
            Err(VersionError::HttpResponse)
        );
        assert_eq!(
            ProtocolVersion::from_packed(0x0001_0004),
            Err(VersionError::OutOfRange(0x0001_0004))
        );
    }

    #[test]
    fn test_pack_range() {
        assert_eq!(
            ProtocolVersion::V5_2.pack_range(ProtocolVersion::V5_0).unwrap(),
            0x0002_0205
        );
        assert_eq!(
            ProtocolVersion::V4_4.pack_range(ProtocolVersion::V4_1).unwrap(),
            0x0003_0404
        );
        assert!(ProtocolVersion::V4_4.pack_range(ProtocolVersion::V3_0).is_err());
        assert!(ProtocolVersion::V4_1.pack_range(ProtocolVersion::V4_4).is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(ProtocolVersion::V5_0 > ProtocolVersion::V4_4);
        assert!(ProtocolVersion::V4_4 > ProtocolVersion::V4_3);
        assert!(ProtocolVersion::V4_0 > ProtocolVersion::V3_0);
        assert!(ProtocolVersion::new(4, 10) < ProtocolVersion::V5_0);
    }

    #[test]
    fn test_display_and_support() {
        assert_eq!(ProtocolVersion::V4_3.to_string(), "4.3");
        assert!(ProtocolVersion::V4_2.is_supported());
        assert!(!ProtocolVersion::new(4, 5).is_supported());
        assert!(!ProtocolVersion::ZERO.is_supported());
    }
}
