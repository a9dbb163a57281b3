//! Push/pull batch payloads.

use crate::entities::{FileMeta, Folder, Note, Tag};
use serde::{Deserialize, Serialize};

/// A batch of entities, used both as the push request body and the pull
/// response body.
///
/// Every sequence is always present on the wire, possibly empty; absent
/// sequences deserialize to empty ones. Clients never have to handle null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncBatch {
    /// Changed notes.
    pub notes: Vec<Note>,
    /// Changed folders.
    pub folders: Vec<Folder>,
    /// Changed file metadata records.
    pub files: Vec<FileMeta>,
    /// Changed tags.
    pub tags: Vec<Tag>,
}

impl SyncBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all four kinds.
    pub fn len(&self) -> usize {
        self.notes.len() + self.folders.len() + self.files.len() + self.tags.len()
    }

    /// Returns true if the batch carries no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response body for a successful push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Watermark stamped on the pushed batch, to be used as the device's
    /// next pull cursor.
    pub cursor: String,
}

/// Response body for a pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// The changed records, per kind.
    #[serde(flatten)]
    pub changes: SyncBatch,
    /// The device's next cursor: the highest watermark in `changes`, or
    /// the requested cursor when nothing changed.
    pub cursor: String,
}

/// Request body for confirming that a blob upload completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitUploadRequest {
    /// Identifier of the file record.
    pub id: String,
    /// Key of the uploaded blob in the external blob store.
    pub blob_key: String,
}

/// Response body for a successful upload commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitUploadResponse {
    /// Storage used by the user after this commit, in bytes.
    pub storage_used: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_sequences_deserialize_empty() {
        let batch: SyncBatch = serde_json::from_str(r#"{"notes":[{"id":"n1"}]}"#).unwrap();
        assert_eq!(batch.notes.len(), 1);
        assert!(batch.folders.is_empty());
        assert!(batch.files.is_empty());
        assert!(batch.tags.is_empty());
    }

    #[test]
    fn empty_batch_serializes_all_sequences() {
        let json = serde_json::to_value(SyncBatch::new()).unwrap();
        for kind in ["notes", "folders", "files", "tags"] {
            assert_eq!(json[kind], serde_json::json!([]));
        }
    }

    #[test]
    fn pull_response_flattens_changes() {
        let response = PullResponse {
            changes: SyncBatch {
                notes: vec![Note::new("n1")],
                ..SyncBatch::new()
            },
            cursor: "2024-06-01T10:00:00.000000Z".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        // Kinds sit at the top level next to the cursor, not nested.
        assert_eq!(json["notes"][0]["id"], "n1");
        assert_eq!(json["cursor"], "2024-06-01T10:00:00.000000Z");
        assert!(json.get("changes").is_none());
    }

    #[test]
    fn batch_len_counts_all_kinds() {
        let batch = SyncBatch {
            notes: vec![Note::new("n1")],
            folders: vec![Folder::new("d1"), Folder::new("d2")],
            files: vec![],
            tags: vec![Tag::new("t1")],
        };
        assert_eq!(batch.len(), 4);
        assert!(!batch.is_empty());
    }
}
