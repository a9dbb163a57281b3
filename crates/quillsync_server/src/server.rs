//! The sync coordinator facade.

use crate::auth::{AuthConfig, TokenValidator};
use crate::blobs::BlobStore;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::files;
use crate::live::LiveSession;
use crate::profiles::{require_profile, ProfileDirectory};
use crate::query::PullParams;
use crate::reconcile;
use chrono::{DateTime, Utc};
use quillsync_broker::NotificationBroker;
use quillsync_protocol::{
    cursor, CommitUploadRequest, CommitUploadResponse, PullResponse, PushResponse, SyncBatch,
};
use quillsync_store::MemoryStore;
use std::sync::Arc;

/// The sync coordinator.
///
/// Owns the entity store and the notification broker; reaches the account
/// system and blob storage through the [`ProfileDirectory`] and
/// [`BlobStore`] seams. `handle_*` methods take the authenticated user
/// identifier the outer HTTP layer extracted; only the live channel does
/// its own token validation, because its transport cannot carry normal
/// auth headers.
pub struct SyncServer<P, B> {
    config: ServerConfig,
    store: Arc<MemoryStore>,
    broker: NotificationBroker,
    validator: TokenValidator,
    profiles: P,
    blobs: B,
}

impl<P: ProfileDirectory, B: BlobStore> SyncServer<P, B> {
    /// Creates a coordinator.
    pub fn new(config: ServerConfig, profiles: P, blobs: B) -> Self {
        let broker = NotificationBroker::new(config.broker.clone());
        let validator = TokenValidator::new(AuthConfig::from(&config));
        Self {
            config,
            store: Arc::new(MemoryStore::new()),
            broker,
            validator,
            profiles,
            blobs,
        }
    }

    /// Starts the broker's background maintenance task. Call once from
    /// within a tokio runtime.
    pub fn spawn_maintenance(&self) -> tokio::task::JoinHandle<()> {
        self.broker.spawn_maintenance()
    }

    /// Stops maintenance and closes every live channel.
    pub fn shutdown(&self) {
        self.broker.shutdown();
    }

    /// Applies a push batch.
    ///
    /// Entitlement, then the body-size ceiling, then JSON decoding, then
    /// one atomic store transaction. On success the user's other live
    /// devices are notified off the request path; the response never
    /// waits on fan-out.
    pub async fn handle_push(&self, user: &str, body: &[u8]) -> ServerResult<PushResponse> {
        let profile = require_profile(&self.profiles, user)?;
        if !profile.sync_enabled {
            return Err(ServerError::SyncNotEntitled);
        }
        if body.len() > self.config.max_push_bytes {
            return Err(ServerError::PayloadTooLarge {
                limit: self.config.max_push_bytes,
                actual: body.len(),
            });
        }
        let batch: SyncBatch = serde_json::from_slice(body)
            .map_err(|err| ServerError::InvalidRequest(format!("bad push body: {err}")))?;
        let record_count = batch.len();

        let watermark = reconcile::apply_push(&self.store, user, batch)?;
        tracing::debug!(user, records = record_count, "push applied");

        if record_count > 0 {
            self.notify_later(user);
        }
        Ok(PushResponse {
            cursor: cursor::format_cursor(watermark),
        })
    }

    /// Answers an incremental pull.
    pub fn handle_pull(&self, user: &str, params: &PullParams) -> ServerResult<PullResponse> {
        require_profile(&self.profiles, user)?;
        let (since, limit) = params.resolve(&self.config)?;
        let changes = self.store.changed_since(user, since, limit);
        let next = next_cursor(&changes, limit, since);
        Ok(PullResponse {
            changes,
            cursor: cursor::format_cursor(next),
        })
    }

    /// Confirms a completed blob upload.
    pub async fn handle_commit_upload(
        &self,
        user: &str,
        body: &[u8],
    ) -> ServerResult<CommitUploadResponse> {
        let profile = require_profile(&self.profiles, user)?;
        if !profile.sync_enabled {
            return Err(ServerError::SyncNotEntitled);
        }
        let request: CommitUploadRequest = serde_json::from_slice(body)
            .map_err(|err| ServerError::InvalidRequest(format!("bad commit body: {err}")))?;

        let response = files::commit_upload(&self.store, &self.blobs, &profile, &request)?;
        self.notify_later(user);
        Ok(response)
    }

    /// Permanently removes a note and its attachments' blobs.
    pub async fn handle_permanent_delete(&self, user: &str, note_id: &str) -> ServerResult<()> {
        require_profile(&self.profiles, user)?;
        files::permanent_delete(&self.store, &self.blobs, user, note_id)?;
        self.notify_later(user);
        Ok(())
    }

    /// Issues a live-channel token for an already-authenticated user.
    pub fn issue_live_token(&self, user: &str) -> String {
        self.validator.issue(user)
    }

    /// Validates a live-channel token and registers a new channel.
    pub async fn open_live_session(&self, token: &str) -> ServerResult<LiveSession> {
        let user = self.validator.validate(token)?;
        let subscription = self.broker.subscribe(&user).await?;
        Ok(LiveSession::new(
            subscription,
            self.config.keepalive_interval,
        ))
    }

    /// The underlying entity store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// The notification broker.
    pub fn broker(&self) -> &NotificationBroker {
        &self.broker
    }

    /// The active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn notify_later(&self, user: &str) {
        let broker = self.broker.clone();
        let user = user.to_string();
        tokio::spawn(async move {
            broker.notify(&user);
        });
    }
}

/// The cursor a device can safely resume from.
///
/// Each kind truncates at the limit independently, so the cursor is the
/// earliest last-returned watermark among the kinds that hit the cap:
/// anything later would step over that kind's cut-off rows for good. When
/// no kind was capped, every changed row made it out and the overall
/// maximum is safe. Rows from other kinds between the two are re-sent on
/// the next pull, which upserts are built to tolerate.
fn next_cursor(batch: &SyncBatch, limit: usize, since: DateTime<Utc>) -> DateTime<Utc> {
    let kinds = [
        (batch.notes.len(), batch.notes.last().and_then(|r| r.server_updated_at)),
        (batch.folders.len(), batch.folders.last().and_then(|r| r.server_updated_at)),
        (batch.files.len(), batch.files.last().and_then(|r| r.server_updated_at)),
        (batch.tags.len(), batch.tags.last().and_then(|r| r.server_updated_at)),
    ];
    let capped = kinds
        .iter()
        .filter(|(len, _)| limit > 0 && *len >= limit)
        .filter_map(|(_, last)| *last)
        .min();
    capped
        .or_else(|| kinds.iter().filter_map(|(_, last)| *last).max())
        .unwrap_or(since)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobs::MemoryBlobStore;
    use crate::profiles::{MemoryProfiles, Profile};

    fn server() -> SyncServer<MemoryProfiles, MemoryBlobStore> {
        let profiles = MemoryProfiles::new();
        profiles.put(Profile::new("u1"));
        profiles.put(Profile::new("free-tier").with_sync_enabled(false));
        SyncServer::new(ServerConfig::default(), profiles, MemoryBlobStore::new())
    }

    #[tokio::test]
    async fn push_requires_entitlement() {
        let server = server();
        let err = server
            .handle_push("free-tier", br#"{"notes":[]}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::SyncNotEntitled));
    }

    #[tokio::test]
    async fn pull_does_not_require_entitlement() {
        let server = server();
        let response = server
            .handle_pull("free-tier", &PullParams::initial())
            .unwrap();
        assert!(response.changes.is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized() {
        let server = server();
        let err = server.handle_push("ghost", b"{}").await.unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn oversized_body_rejected_before_parsing() {
        let profiles = MemoryProfiles::new();
        profiles.put(Profile::new("u1"));
        let server = SyncServer::new(
            ServerConfig::default().with_max_push_bytes(16),
            profiles,
            MemoryBlobStore::new(),
        );
        let err = server
            .handle_push("u1", &vec![b' '; 17])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::PayloadTooLarge { limit: 16, actual: 17 }
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let server = server();
        let err = server.handle_push("u1", b"not json").await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn empty_cursor_on_empty_workspace_is_the_epoch() {
        let server = server();
        let response = server.handle_pull("u1", &PullParams::initial()).unwrap();
        assert_eq!(response.cursor, "1970-01-01T00:00:00.000000Z");
    }

    #[test]
    fn cursor_holds_at_the_capped_kind() {
        use quillsync_protocol::{Note, Tag};

        let t = |secs| DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs);
        let stamped_note = |id: &str, secs| Note {
            server_updated_at: Some(t(secs)),
            ..Note::new(id)
        };
        let batch = SyncBatch {
            notes: vec![stamped_note("n0", 1), stamped_note("n1", 2)],
            tags: vec![Tag {
                server_updated_at: Some(t(4)),
                ..Tag::new("t1")
            }],
            ..SyncBatch::new()
        };

        // Notes hit the cap at t=2; a cursor past that would strand n2.
        assert_eq!(next_cursor(&batch, 2, t(0)), t(2));
        // With a roomier limit nothing was cut off and the max is safe.
        assert_eq!(next_cursor(&batch, 10, t(0)), t(4));
        // An empty batch keeps the requested cursor.
        assert_eq!(next_cursor(&SyncBatch::new(), 2, t(7)), t(7));
    }

    #[tokio::test]
    async fn live_token_round_trip_opens_a_channel() {
        let server = server();
        let token = server.issue_live_token("u1");
        let session = server.open_live_session(&token).await.unwrap();
        assert_eq!(session.user(), "u1");
        assert_eq!(server.broker().channel_count("u1"), 1);
    }

    #[tokio::test]
    async fn live_session_rejects_bad_token() {
        let server = server();
        let err = server.open_live_session("deadbeef").await.unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(_)));
    }
}
