//! Bolt protocol error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

use super::handshake::ProtocolVersion;
use super::message::ServerFailure;
use super::packstream::PackStreamError;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Bolt protocol errors.
#[derive(Debug, Error)]
pub enum BoltError {
    /// I/O error, including an unexpected end of stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PackStream serialization error
    #[error("PackStream error: {0}")]
    PackStream(#[from] PackStreamError),

    /// Version negotiation error
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// The server broke the protocol (unexpected message, bad shape)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The caller asked for something the negotiated version cannot do
    #[error("Client error: {0}")]
    Client(String),

    /// The server answered with FAILURE
    #[error("Server error: {0}")]
    Server(ServerFailure),

    /// No bytes arrived within the configured read timeout
    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The connection was already closed or is defunct
    #[error("Connection closed")]
    ConnectionClosed,
}

impl BoltError {
    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        BoltError::Protocol(msg.into())
    }

    /// Create a client error.
    pub fn client(msg: impl Into<String>) -> Self {
        BoltError::Client(msg.into())
    }

    /// An I/O error of kind `UnexpectedEof`.
    pub fn unexpected_eof() -> Self {
        BoltError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Unexpected end of stream",
        ))
    }

    /// Whether the connection must be discarded after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            BoltError::Io(_)
            | BoltError::PackStream(_)
            | BoltError::Version(_)
            | BoltError::Protocol(_)
            | BoltError::ReadTimeout(_)
            | BoltError::ConnectionClosed => true,
            BoltError::Server(failure) => failure.is_protocol_violation(),
            BoltError::Client(_) => false,
        }
    }

    /// Whether this is a usage error raised before any I/O.
    pub fn is_client_error(&self) -> bool {
        matches!(self, BoltError::Client(_))
    }

    /// The server failure carried by this error, if any.
    pub fn server_failure(&self) -> Option<&ServerFailure> {
        match self {
            BoltError::Server(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ServerFailure> for BoltError {
    fn from(failure: ServerFailure) -> Self {
        BoltError::Server(failure)
    }
}

/// Version negotiation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The server answered the handshake with an HTTP response
    #[error("Server responded HTTP. Make sure you are not trying to connect to the http endpoint")]
    HttpResponse,

    /// The server accepted none of the proposed versions
    #[error("The server does not support any of the protocol versions supported by this driver")]
    NoCompatibleVersion,

    /// The raw value has bits set above the version bytes
    #[error("Raw protocol version 0x{0:08X} is out of range")]
    OutOfRange(u32),

    /// A range proposal whose bounds do not share a major or are inverted
    #[error("Invalid version range {min}..={max}")]
    InvalidRange {
        /// Lowest version in the range
        min: ProtocolVersion,
        /// Highest version in the range
        max: ProtocolVersion,
    },

    /// A well-formed version this driver does not speak
    #[error("Protocol version {0} is not supported")]
    Unsupported(ProtocolVersion),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bolt_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let bolt_err: BoltError = io_err.into();
        assert!(matches!(bolt_err, BoltError::Io(_)));
        assert!(bolt_err.is_fatal());
    }

    #[test]
    fn test_bolt_error_from_version() {
        let bolt_err: BoltError = VersionError::HttpResponse.into();
        assert!(matches!(bolt_err, BoltError::Version(VersionError::HttpResponse)));
        assert!(bolt_err.to_string().contains("HTTP"));
    }

    #[test]
    fn test_classification() {
        assert!(!BoltError::client("bad").is_fatal());
        assert!(BoltError::client("bad").is_client_error());
        assert!(BoltError::protocol("bad").is_fatal());
        assert!(BoltError::ReadTimeout(Duration::from_secs(1)).is_fatal());

        let syntax = ServerFailure::new("Neo.ClientError.Statement.SyntaxError", "oops");
        let err = BoltError::from(syntax.clone());
        assert!(!err.is_fatal());
        assert_eq!(err.server_failure(), Some(&syntax));

        let violation = ServerFailure::new("Neo.ClientError.Request.Invalid", "bad message");
        assert!(BoltError::Server(violation).is_fatal());
    }

    #[test]
    fn test_unexpected_eof_kind() {
        match BoltError::unexpected_eof() {
            BoltError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {:?}", other),
        }
    }
}
