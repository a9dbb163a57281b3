//! Error types for the broker.

use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors that can occur in the notification broker.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The global connection cap is saturated and the configured policy
    /// is to reject rather than wait.
    #[error("broker at capacity")]
    AtCapacity,

    /// The broker has been shut down.
    #[error("broker shut down")]
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(BrokerError::AtCapacity.to_string(), "broker at capacity");
    }
}
