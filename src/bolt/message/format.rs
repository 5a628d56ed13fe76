//! Per-version message encoding.

use crate::bolt::error::{BoltError, BoltResult};
use crate::bolt::handshake::ProtocolVersion;
use crate::bolt::packstream::{PackStreamDecoder, PackStreamEncoder, SliceSource, StructTable};

use super::{BoltRequest, BoltResponse};

/// Message writer and reader for one negotiated version.
///
/// The struct table is chosen once here: 5.0 and later decode element ids
/// and UTC date-times, older versions the legacy layouts.
#[derive(Debug, Clone)]
pub struct MessageFormat {
    version: ProtocolVersion,
    structs: StructTable,
}

impl MessageFormat {
    /// Format for `version`.
    pub fn for_version(version: ProtocolVersion) -> Self {
        let structs = if version >= ProtocolVersion::V5_0 {
            StructTable::v5()
        } else {
            StructTable::legacy()
        };
        Self { version, structs }
    }

    /// The version requests are rendered for.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// The struct table responses are decoded with.
    pub fn structs(&self) -> &StructTable {
        &self.structs
    }

    /// Append `request` to `encoder`.
    pub fn write(&self, request: &BoltRequest, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        encoder.encode_structure(&request.to_structure(self.version))?;
        Ok(())
    }

    /// Decode one complete response message.
    pub fn read(&self, payload: &[u8]) -> BoltResult<BoltResponse> {
        let mut decoder = PackStreamDecoder::new(SliceSource::new(payload), &self.structs);
        let (field_count, signature) = decoder.read_struct_header()?;
        let fields = (0..field_count)
            .map(|_| decoder.decode())
            .collect::<Result<Vec<_>, _>>()?;

        let trailing = decoder.source().remaining();
        if trailing > 0 {
            return Err(BoltError::protocol(format!(
                "{} trailing bytes after message 0x{:02X}",
                trailing, signature
            )));
        }
        Ok(BoltResponse::from_fields(signature, fields)?)
    }
}
