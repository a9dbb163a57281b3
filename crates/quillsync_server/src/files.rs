//! File lifecycle: upload commits and permanent note deletion.
//!
//! Upload flow: the client pushes a file record, uploads the blob
//! directly to external storage under a key scoped to its user, then
//! commits the key here. The commit is where quota is enforced, against
//! the blob store's own size for the key rather than anything the client
//! claimed.

use crate::blobs::{BlobError, BlobStore};
use crate::error::{ServerError, ServerResult};
use crate::profiles::Profile;
use quillsync_protocol::{CommitUploadRequest, CommitUploadResponse};
use quillsync_store::MemoryStore;

pub(crate) fn commit_upload<B: BlobStore>(
    store: &MemoryStore,
    blobs: &B,
    profile: &Profile,
    request: &CommitUploadRequest,
) -> ServerResult<CommitUploadResponse> {
    if request.id.is_empty() {
        return Err(ServerError::InvalidRequest("empty file id".into()));
    }
    let prefix = format!("{}/", profile.user_id);
    if !request.blob_key.starts_with(&prefix) {
        return Err(ServerError::InvalidRequest(format!(
            "blob key {:?} is outside the caller's namespace",
            request.blob_key
        )));
    }

    let info = match blobs.stat(&request.blob_key) {
        Ok(info) => info,
        Err(BlobError::NotFound(key)) => return Err(ServerError::BlobMissing(key)),
        Err(BlobError::Backend(msg)) => return Err(ServerError::BlobStore(msg)),
    };

    // Size comes from the blob store, not the client. If the commit would
    // exceed quota the just-uploaded blob is orphaned; delete it so the
    // user does not carry invisible storage.
    let used = store.storage_used(&profile.user_id);
    if used + info.size > profile.storage_limit {
        if let Err(err) = blobs.remove(&request.blob_key) {
            tracing::warn!(key = %request.blob_key, %err, "orphan blob cleanup failed");
        }
        return Err(ServerError::QuotaExceeded {
            limit: profile.storage_limit,
            used,
            incoming: info.size,
        });
    }

    store.commit_file_record(&profile.user_id, &request.id, &request.blob_key, info.size)?;
    Ok(CommitUploadResponse {
        storage_used: store.storage_used(&profile.user_id),
    })
}

/// Permanently removes a note and its attachments' blobs.
///
/// Blob removal is best effort: a blob store failure is logged and skipped
/// so a flaky backend cannot leave the note itself undeletable. Deleting
/// an absent note succeeds.
pub(crate) fn permanent_delete<B: BlobStore>(
    store: &MemoryStore,
    blobs: &B,
    user: &str,
    note_id: &str,
) -> ServerResult<()> {
    if note_id.is_empty() {
        return Err(ServerError::InvalidRequest("empty note id".into()));
    }
    for key in store.note_file_keys(user, note_id) {
        if let Err(err) = blobs.remove(&key) {
            tracing::warn!(%key, %err, "blob removal failed during note delete");
        }
    }
    store.delete_note(user, note_id);
    Ok(())
}
