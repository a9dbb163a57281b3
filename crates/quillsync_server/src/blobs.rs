//! Blob store boundary.
//!
//! File bodies never pass through the sync coordinator. Clients upload
//! them directly to external storage and then commit the resulting key
//! through the sync surface, so all the coordinator needs from the blob
//! store is existence/size checks and deletion. [`MemoryBlobStore`]
//! backs tests.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Metadata for a stored blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobInfo {
    /// Blob size in bytes.
    pub size: i64,
}

/// Errors from the external blob store.
#[derive(Error, Debug)]
pub enum BlobError {
    /// No blob exists under the given key.
    #[error("no blob at key {0}")]
    NotFound(String),

    /// The store itself failed.
    #[error("blob store error: {0}")]
    Backend(String),
}

/// Minimal view of external blob storage.
pub trait BlobStore: Send + Sync + 'static {
    /// Returns metadata for the blob at `key`.
    fn stat(&self, key: &str) -> Result<BlobInfo, BlobError>;

    /// Deletes the blob at `key`. Deleting a missing blob is not an
    /// error.
    fn remove(&self, key: &str) -> Result<(), BlobError>;
}

/// In-memory blob store keyed by blob key, tracking sizes only.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<HashMap<String, i64>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a blob of the given size, as a direct upload would.
    pub fn put(&self, key: impl Into<String>, size: i64) {
        self.inner.write().insert(key.into(), size);
    }

    /// Returns true if a blob exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }
}

impl BlobStore for MemoryBlobStore {
    fn stat(&self, key: &str) -> Result<BlobInfo, BlobError> {
        self.inner
            .read()
            .get(key)
            .map(|&size| BlobInfo { size })
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), BlobError> {
        self.inner.write().remove(key);
        Ok(())
    }
}
