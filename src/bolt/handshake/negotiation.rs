//! Client side of the version negotiation.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::{ProtocolVersion, VersionError, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};
use crate::bolt::error::{BoltError, BoltResult};

/// Version proposals, most preferred first: 5.2 down to 5.0, 4.4 down to
/// 4.1, then 4.0 and 3.0 exactly.
pub const PROPOSALS: [u32; 4] = [0x0002_0205, 0x0003_0404, 0x0000_0004, 0x0000_0003];

/// The 20 bytes a client opens a connection with.
pub fn handshake_request() -> [u8; HANDSHAKE_SIZE] {
    let mut out = [0u8; HANDSHAKE_SIZE];
    out[..4].copy_from_slice(&BOLT_MAGIC);
    for (i, proposal) in PROPOSALS.iter().enumerate() {
        let start = 4 + i * 4;
        out[start..start + 4].copy_from_slice(&proposal.to_be_bytes());
    }
    out
}

/// Interpret the server's 4-byte answer.
pub fn negotiate(answer: [u8; HANDSHAKE_RESPONSE_SIZE]) -> Result<ProtocolVersion, VersionError> {
    let version = ProtocolVersion::from_packed(u32::from_be_bytes(answer))?;
    if version == ProtocolVersion::ZERO {
        return Err(VersionError::NoCompatibleVersion);
    }
    if !version.is_supported() {
        return Err(VersionError::Unsupported(version));
    }
    Ok(version)
}

/// Send the proposals over `stream` and read the agreed version.
///
/// If no answer arrives within `read_timeout` the stream is shut down.
pub async fn perform_handshake<S>(
    stream: &mut S,
    read_timeout: Option<Duration>,
) -> BoltResult<ProtocolVersion>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = handshake_request();
    debug!("C: [HANDSHAKE] {:02X?}", request);
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut answer = [0u8; HANDSHAKE_RESPONSE_SIZE];
    let read = match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.read_exact(&mut answer)).await {
            Ok(read) => read,
            Err(_) => {
                warn!("No handshake answer within {:?}, closing connection", limit);
                if let Err(e) = stream.shutdown().await {
                    debug!("Shutdown after handshake timeout failed: {}", e);
                }
                return Err(BoltError::ReadTimeout(limit));
            }
        },
        None => stream.read_exact(&mut answer).await,
    };
    read?;

    let version = negotiate(answer)?;
    debug!("S: [HANDSHAKE] {}", version);
    Ok(version)
}
