//! Server configuration.

use seglog_protocol::DEFAULT_MAX_FRAME_BYTES;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Configuration for the log server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Fallback wake-up for consume streams waiting on appends made outside
    /// the service.
    pub poll_interval: Duration,
    /// Largest accepted frame, in bytes.
    pub max_frame_bytes: usize,
    /// Secret key for subject tokens. Without one, `Hello` tokens are taken
    /// as plain subject names.
    pub auth_secret: Option<Vec<u8>>,
    /// How long a subject token stays valid.
    pub token_expiry: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 7171)))
    }
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            poll_interval: Duration::from_millis(100),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            auth_secret: None,
            token_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the consume stream poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum frame size.
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Requires signed subject tokens.
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.auth_secret = Some(secret);
        self
    }

    /// Sets the token expiry.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 7171);
        assert!(config.auth_secret.is_none());
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn builder_pattern() {
        let config = ServerConfig::default()
            .with_bind_addr("0.0.0.0:9000".parse().unwrap())
            .with_poll_interval(Duration::from_millis(5))
            .with_max_frame_bytes(1024)
            .with_auth(b"secret".to_vec())
            .with_token_expiry(Duration::from_secs(60));

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.max_frame_bytes, 1024);
        assert_eq!(config.auth_secret.as_deref(), Some(&b"secret"[..]));
        assert_eq!(config.token_expiry, Duration::from_secs(60));
    }
}
