//! Connection configuration.
//!
//! Configuration is supplied in code. Nothing here reads files or the
//! environment.

use std::collections::HashMap;
use std::time::Duration;

/// Records requested per PULL unless configured otherwise.
pub const DEFAULT_FETCH_SIZE: i64 = 1000;

// ============================================================================
// BufferSettings
// ============================================================================

/// Sizes of the framer's read and write buffers.
///
/// A buffer may grow past its maximum to hold one large message. Once it is
/// drained it is shrunk back to the default size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSettings {
    /// Initial read buffer size
    pub default_read_buffer_size: usize,
    /// Read buffer size above which a drained buffer is shrunk
    pub max_read_buffer_size: usize,
    /// Initial write buffer size
    pub default_write_buffer_size: usize,
    /// Write buffer size above which a flushed buffer is shrunk
    pub max_write_buffer_size: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            default_read_buffer_size: 32 * 1024,
            max_read_buffer_size: 128 * 1024,
            default_write_buffer_size: 16 * 1024,
            max_write_buffer_size: 64 * 1024,
        }
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// User agent sent in HELLO
    pub user_agent: String,
    /// Routing context sent in HELLO and used for routing table requests.
    /// `None` means the connection is not used for routing.
    pub routing_context: Option<HashMap<String, String>>,
    /// Limit on each wait for inbound bytes
    pub read_timeout: Option<Duration>,
    /// Framer buffer sizes
    pub buffer_settings: BufferSettings,
    /// Records requested per PULL
    pub fetch_size: i64,
}

impl ConnectionConfig {
    /// Start a builder.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("zeta4g-bolt/{}", env!("CARGO_PKG_VERSION")),
            routing_context: None,
            read_timeout: None,
            buffer_settings: BufferSettings::default(),
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }
}

// ============================================================================
// ConnectionConfigBuilder
// ============================================================================

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the routing context.
    pub fn with_routing_context(mut self, context: HashMap<String, String>) -> Self {
        self.config.routing_context = Some(context);
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Set buffer sizes.
    pub fn with_buffer_settings(mut self, settings: BufferSettings) -> Self {
        self.config.buffer_settings = settings;
        self
    }

    /// Set the fetch size. Use [`FETCH_ALL`](crate::bolt::message::FETCH_ALL)
    /// to pull everything at once.
    pub fn with_fetch_size(mut self, size: i64) -> Self {
        self.config.fetch_size = size;
        self
    }

    /// Finish.
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.fetch_size, 1000);
        assert!(config.read_timeout.is_none());
        assert!(config.routing_context.is_none());
        assert!(config.user_agent.starts_with("zeta4g-bolt/"));

        let buffers = BufferSettings::default();
        assert_eq!(buffers.default_read_buffer_size, 32768);
        assert_eq!(buffers.max_read_buffer_size, 131072);
        assert_eq!(buffers.default_write_buffer_size, 16384);
        assert_eq!(buffers.max_write_buffer_size, 65536);
    }

    #[test]
    fn test_builder() {
        let mut context = HashMap::new();
        context.insert("address".to_string(), "localhost:7687".to_string());

        let config = ConnectionConfig::builder()
            .with_user_agent("test/1.0")
            .with_read_timeout(Duration::from_secs(5))
            .with_routing_context(context.clone())
            .with_fetch_size(-1)
            .build();

        assert_eq!(config.user_agent, "test/1.0");
        assert_eq!(config.read_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.routing_context, Some(context));
        assert_eq!(config.fetch_size, -1);
    }
}
