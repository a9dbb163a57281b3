//! Broker configuration.

use std::time::Duration;

/// What `subscribe` does when the global connection cap is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityPolicy {
    /// Wait until another channel releases its slot.
    Wait,
    /// Fail immediately with a capacity error.
    Reject,
}

/// Configuration for the notification broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Channels silent for this long are closed by the maintenance task.
    /// Heartbeats go out at half this interval.
    pub stale_timeout: Duration,
    /// Maximum simultaneous channels per user (0 = unlimited).
    pub max_devices_per_user: usize,
    /// Maximum concurrent channels across all users (None = unlimited).
    pub max_total_connections: Option<usize>,
    /// Behavior when the global cap is saturated.
    pub capacity_policy: CapacityPolicy,
}

impl BrokerConfig {
    /// Creates the default configuration: 5 minute staleness timeout,
    /// 3 devices per user, no global cap.
    pub fn new() -> Self {
        Self {
            stale_timeout: Duration::from_secs(5 * 60),
            max_devices_per_user: 3,
            max_total_connections: None,
            capacity_policy: CapacityPolicy::Wait,
        }
    }

    /// Sets the staleness timeout.
    pub fn with_stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout = timeout;
        self
    }

    /// Sets the per-user device cap (0 = unlimited).
    pub fn with_max_devices_per_user(mut self, max: usize) -> Self {
        self.max_devices_per_user = max;
        self
    }

    /// Sets the global connection cap.
    pub fn with_max_total_connections(mut self, max: usize) -> Self {
        self.max_total_connections = Some(max);
        self
    }

    /// Sets the saturation policy for the global cap.
    pub fn with_capacity_policy(mut self, policy: CapacityPolicy) -> Self {
        self.capacity_policy = policy;
        self
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.stale_timeout, Duration::from_secs(300));
        assert_eq!(config.max_devices_per_user, 3);
        assert!(config.max_total_connections.is_none());
        assert_eq!(config.capacity_policy, CapacityPolicy::Wait);
    }

    #[test]
    fn builder() {
        let config = BrokerConfig::new()
            .with_stale_timeout(Duration::from_secs(60))
            .with_max_devices_per_user(5)
            .with_max_total_connections(100)
            .with_capacity_policy(CapacityPolicy::Reject);
        assert_eq!(config.stale_timeout, Duration::from_secs(60));
        assert_eq!(config.max_devices_per_user, 5);
        assert_eq!(config.max_total_connections, Some(100));
        assert_eq!(config.capacity_policy, CapacityPolicy::Reject);
    }
}
