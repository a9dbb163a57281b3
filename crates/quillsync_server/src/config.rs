//! Server configuration.

use quillsync_broker::BrokerConfig;
use std::time::Duration;

/// Configuration for the sync coordinator.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Hard ceiling on the push request body, enforced before parsing.
    pub max_push_bytes: usize,
    /// Hard per-kind ceiling on pull results, regardless of what the
    /// client requests.
    pub max_pull_limit: usize,
    /// Interval between keep-alive events on an otherwise quiet live
    /// channel.
    pub keepalive_interval: Duration,
    /// Secret for live-channel token validation.
    pub auth_secret: Vec<u8>,
    /// Lifetime of issued live-channel tokens.
    pub token_ttl: Duration,
    /// Notification broker settings.
    pub broker: BrokerConfig,
}

impl ServerConfig {
    /// Creates a configuration with the given token secret and the
    /// default ceilings: 15 MiB push bodies, 1000 rows per kind, 30 s
    /// keep-alives, 24 h tokens.
    pub fn new(auth_secret: Vec<u8>) -> Self {
        Self {
            max_push_bytes: 15 * 1024 * 1024,
            max_pull_limit: 1000,
            keepalive_interval: Duration::from_secs(30),
            auth_secret,
            token_ttl: Duration::from_secs(24 * 60 * 60),
            broker: BrokerConfig::default(),
        }
    }

    /// Sets the push body ceiling.
    pub fn with_max_push_bytes(mut self, max: usize) -> Self {
        self.max_push_bytes = max;
        self
    }

    /// Sets the per-kind pull ceiling.
    pub fn with_max_pull_limit(mut self, max: usize) -> Self {
        self.max_pull_limit = max;
        self
    }

    /// Sets the keep-alive interval for live channels.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets the token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Replaces the broker settings.
    pub fn with_broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = broker;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(b"quillsync-development-secret".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceilings() {
        let config = ServerConfig::default();
        assert_eq!(config.max_push_bytes, 15 * 1024 * 1024);
        assert_eq!(config.max_pull_limit, 1000);
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
    }

    #[test]
    fn builder() {
        let config = ServerConfig::new(b"s".to_vec())
            .with_max_push_bytes(1024)
            .with_max_pull_limit(10)
            .with_keepalive_interval(Duration::from_secs(5));
        assert_eq!(config.max_push_bytes, 1024);
        assert_eq!(config.max_pull_limit, 10);
        assert_eq!(config.keepalive_interval, Duration::from_secs(5));
    }
}
