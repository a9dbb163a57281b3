//! Push reconciliation.
//!
//! Normalizes an incoming batch and applies it to the store in one
//! transaction. Normalization smooths over what real clients actually
//! send: records with empty identifiers are skipped rather than failing
//! the batch, opaque JSON lists are coerced to arrays, and file records
//! get sensible timestamp defaults.

use chrono::{DateTime, Utc};
use quillsync_protocol::SyncBatch;
use quillsync_store::{MemoryStore, StoreResult};
use serde_json::Value;

/// Applies a push batch for `owner` atomically.
///
/// Returns the watermark stamped on every accepted row, which doubles as
/// the caller's next cursor. Cross-owner records inside the batch are
/// dropped without failing it; constraint violations roll the whole batch
/// back.
pub(crate) fn apply_push(
    store: &MemoryStore,
    owner: &str,
    batch: SyncBatch,
) -> StoreResult<DateTime<Utc>> {
    store.apply(|txn| {
        let now = txn.watermark();
        for mut note in batch.notes {
            if note.id.is_empty() {
                continue;
            }
            note.tags = coerce_array(note.tags);
            note.attachments = coerce_array(note.attachments);
            note.updated_at = note.updated_at.or(Some(now));
            txn.upsert_note(owner, note)?;
        }
        for mut folder in batch.folders {
            if folder.id.is_empty() {
                continue;
            }
            folder.updated_at = folder.updated_at.or(Some(now));
            txn.upsert_folder(owner, folder)?;
        }
        for mut file in batch.files {
            if file.id.is_empty() {
                continue;
            }
            // A client that already knows the blob key has finished the
            // upload, whatever its flag says.
            file.is_uploaded = file.is_uploaded || file.blob_key.is_some();
            file.created_at = file.created_at.or(Some(now));
            file.updated_at = file.updated_at.or(Some(now));
            txn.upsert_file(owner, file)?;
        }
        for mut tag in batch.tags {
            if tag.id.is_empty() {
                continue;
            }
            tag.updated_at = tag.updated_at.or(Some(now));
            txn.upsert_tag(owner, tag)?;
        }
        Ok(())
    })
}

/// Null becomes an empty array; any other shape is stored verbatim.
fn coerce_array(value: Value) -> Value {
    match value {
        Value::Null => Value::Array(Vec::new()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillsync_protocol::{cursor, FileMeta, Note, Tag};

    #[test]
    fn empty_ids_are_skipped_not_fatal() {
        let store = MemoryStore::new();
        let batch = SyncBatch {
            notes: vec![Note::new(""), Note::new("n1")],
            tags: vec![Tag::new("")],
            ..SyncBatch::new()
        };
        apply_push(&store, "u1", batch).unwrap();
        let pulled = store.changed_since("u1", cursor::epoch(), 0);
        assert_eq!(pulled.notes.len(), 1);
        assert!(pulled.tags.is_empty());
    }

    #[test]
    fn null_tags_become_empty_array() {
        let store = MemoryStore::new();
        let mut note = Note::new("n1");
        note.tags = Value::Null;
        apply_push(&store, "u1", SyncBatch { notes: vec![note], ..SyncBatch::new() }).unwrap();
        let pulled = store.changed_since("u1", cursor::epoch(), 0);
        assert_eq!(pulled.notes[0].tags, serde_json::json!([]));
    }

    #[test]
    fn blob_key_implies_uploaded() {
        let store = MemoryStore::new();
        let mut file = FileMeta::new("f1");
        file.blob_key = Some("u1/f1".into());
        file.size = 10;
        apply_push(&store, "u1", SyncBatch { files: vec![file], ..SyncBatch::new() }).unwrap();
        assert!(store.file("u1", "f1").unwrap().is_uploaded);
        assert_eq!(store.storage_used("u1"), 10);
    }

    #[test]
    fn file_timestamps_default_to_watermark() {
        let store = MemoryStore::new();
        let file = FileMeta::new("f1");
        let watermark = apply_push(
            &store,
            "u1",
            SyncBatch { files: vec![file], ..SyncBatch::new() },
        )
        .unwrap();
        let stored = store.file("u1", "f1").unwrap();
        assert_eq!(stored.created_at, Some(watermark));
        assert_eq!(stored.updated_at, Some(watermark));
    }

    #[test]
    fn returned_watermark_is_the_next_cursor() {
        let store = MemoryStore::new();
        let w1 = apply_push(
            &store,
            "u1",
            SyncBatch { notes: vec![Note::new("n1")], ..SyncBatch::new() },
        )
        .unwrap();
        // Pulling from the push's own watermark yields nothing new.
        assert!(store.changed_since("u1", w1, 0).notes.is_empty());
    }
}
