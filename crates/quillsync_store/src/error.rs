//! Error types for the store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the entity store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record violated a store constraint. Fails the whole batch.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl StoreError {
    /// Creates a constraint violation error.
    pub fn constraint(message: impl Into<String>) -> Self {
        StoreError::Constraint(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_display() {
        let err = StoreError::constraint("id too long");
        assert!(err.to_string().contains("id too long"));
    }
}
