//! Error types for the sync coordinator.

use quillsync_broker::BrokerError;
use quillsync_store::StoreError;
use thiserror::Error;

/// Result type for coordinator operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced at the request boundary.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing or invalid identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The account's plan does not include synchronization.
    #[error("sync not available for this account")]
    SyncNotEntitled,

    /// Request body exceeded the configured ceiling; rejected before
    /// parsing.
    #[error("payload too large: {actual} bytes (limit {limit})")]
    PayloadTooLarge {
        /// Configured ceiling in bytes.
        limit: usize,
        /// Actual body size in bytes.
        actual: usize,
    },

    /// Request body or parameters failed to parse.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The whole push batch was rolled back. No partial per-record
    /// status exists.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Accepting the upload would exceed the account's storage limit.
    #[error("quota exceeded: {used} + {incoming} > {limit}")]
    QuotaExceeded {
        /// Account storage limit in bytes.
        limit: i64,
        /// Storage already used in bytes.
        used: i64,
        /// Size of the incoming blob in bytes.
        incoming: i64,
    },

    /// The blob referenced by an upload commit is not present in the
    /// external blob store.
    #[error("blob not found: {0}")]
    BlobMissing(String),

    /// The external blob store itself failed.
    #[error("blob store failure: {0}")]
    BlobStore(String),

    /// The broker's global connection cap is saturated.
    #[error("live channel capacity exhausted")]
    Capacity,

    /// The request was cancelled or the server is shutting down.
    #[error("cancelled")]
    Cancelled,
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::Unauthorized(_)
                | ServerError::SyncNotEntitled
                | ServerError::PayloadTooLarge { .. }
                | ServerError::InvalidRequest(_)
                | ServerError::QuotaExceeded { .. }
                | ServerError::BlobMissing(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::Store(_)
                | ServerError::BlobStore(_)
                | ServerError::Capacity
                | ServerError::Cancelled
        )
    }
}

impl From<BrokerError> for ServerError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::AtCapacity => ServerError::Capacity,
            BrokerError::ShutDown => ServerError::Cancelled,
        }
    }
}
