//! Account profile lookup.
//!
//! Entitlement and quota live outside the sync core, in whatever account
//! system the deployment runs. The coordinator reaches them through the
//! [`ProfileDirectory`] seam; [`MemoryProfiles`] backs tests and
//! single-process deployments.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Account attributes the coordinator cares about.
#[derive(Debug, Clone)]
pub struct Profile {
    /// User identifier.
    pub user_id: String,
    /// Whether the account's plan includes synchronization.
    pub sync_enabled: bool,
    /// Storage limit in bytes.
    pub storage_limit: i64,
}

impl Profile {
    /// Creates a profile with sync enabled and a 1 GiB storage limit.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            sync_enabled: true,
            storage_limit: 1024 * 1024 * 1024,
        }
    }

    /// Sets whether synchronization is available to this account.
    pub fn with_sync_enabled(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    /// Sets the storage limit in bytes.
    pub fn with_storage_limit(mut self, limit: i64) -> Self {
        self.storage_limit = limit;
        self
    }
}

/// Resolves user identifiers to account profiles.
pub trait ProfileDirectory: Send + Sync + 'static {
    /// Looks up a profile. Unknown users yield `Ok(None)`.
    fn profile(&self, user: &str) -> ServerResult<Option<Profile>>;
}

/// In-memory profile directory.
#[derive(Clone, Default)]
pub struct MemoryProfiles {
    inner: Arc<RwLock<HashMap<String, Profile>>>,
}

impl MemoryProfiles {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a profile.
    pub fn put(&self, profile: Profile) {
        self.inner.write().insert(profile.user_id.clone(), profile);
    }

    /// Removes a profile.
    pub fn remove(&self, user: &str) {
        self.inner.write().remove(user);
    }
}

impl ProfileDirectory for MemoryProfiles {
    fn profile(&self, user: &str) -> ServerResult<Option<Profile>> {
        Ok(self.inner.read().get(user).cloned())
    }
}

/// Resolves a profile or maps its absence to an authorization error.
pub(crate) fn require_profile<P: ProfileDirectory>(
    directory: &P,
    user: &str,
) -> ServerResult<Profile> {
    directory
        .profile(user)?
        .ok_or_else(|| ServerError::Unauthorized(format!("unknown user {user}")))
}
