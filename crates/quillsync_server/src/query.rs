//! Pull parameter resolution.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, Utc};
use quillsync_protocol::cursor;

/// Raw pull parameters, as they arrive at the request boundary.
#[derive(Debug, Clone, Default)]
pub struct PullParams {
    /// Cursor string; `None` means the device has never synced.
    pub since: Option<String>,
    /// Requested per-kind row cap; `None` means "as much as allowed".
    pub limit: Option<usize>,
}

impl PullParams {
    /// Parameters for a first-time pull of everything.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Sets the cursor.
    pub fn with_since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    /// Sets the requested per-kind limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resolves the raw parameters against the configured ceilings.
    ///
    /// An absent cursor defaults to the epoch; a present but unparseable
    /// one is a client error, never silently the epoch, since that would
    /// re-send the user's entire workspace. The limit is clamped to the
    /// configured per-kind ceiling; 0 and absent both mean the ceiling.
    pub(crate) fn resolve(&self, config: &ServerConfig) -> ServerResult<(DateTime<Utc>, usize)> {
        let since = match &self.since {
            None => cursor::epoch(),
            Some(raw) => cursor::parse_cursor(raw)
                .ok_or_else(|| ServerError::InvalidRequest(format!("bad cursor {raw:?}")))?,
        };
        let limit = match self.limit {
            None | Some(0) => config.max_pull_limit,
            Some(n) => n.min(config.max_pull_limit),
        };
        Ok((since, limit))
    }
}
