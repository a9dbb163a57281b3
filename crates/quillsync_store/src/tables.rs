//! Row types for the four collections.
//!
//! A row is the stored form of a wire record: the record itself plus the
//! owning user and the server watermark. The watermark is kept outside the
//! record so a client-supplied `serverUpdatedAt` can never leak into
//! storage.

use chrono::{DateTime, Utc};
use quillsync_protocol::{FileMeta, Folder, Note, Tag};

/// A stored note.
#[derive(Debug, Clone)]
pub struct NoteRow {
    /// Owning user.
    pub owner: String,
    /// The note record as last written.
    pub record: Note,
    /// Content-derived size in bytes.
    pub size: i64,
    /// Server watermark of the last write, if one was recorded.
    pub server_updated_at: Option<DateTime<Utc>>,
}

/// A stored folder.
#[derive(Debug, Clone)]
pub struct FolderRow {
    /// Owning user.
    pub owner: String,
    /// The folder record as last written.
    pub record: Folder,
    /// Server watermark of the last write, if one was recorded.
    pub server_updated_at: Option<DateTime<Utc>>,
}

/// A stored file metadata record.
#[derive(Debug, Clone)]
pub struct FileRow {
    /// Owning user.
    pub owner: String,
    /// The file record after merge.
    pub record: FileMeta,
    /// Server watermark of the last write, if one was recorded.
    pub server_updated_at: Option<DateTime<Utc>>,
}

/// A stored tag.
#[derive(Debug, Clone)]
pub struct TagRow {
    /// Owning user.
    pub owner: String,
    /// The tag record as last written.
    pub record: Tag,
    /// Server watermark of the last write, if one was recorded.
    pub server_updated_at: Option<DateTime<Utc>>,
}

impl NoteRow {
    /// The watermark used for cursor comparisons.
    ///
    /// Falls back to the client update time (then the epoch) for rows
    /// whose watermark was never recorded, so every row stays comparable
    /// to a cursor.
    pub fn watermark(&self) -> DateTime<Utc> {
        effective_watermark(self.server_updated_at, self.record.updated_at)
    }
}

impl FolderRow {
    /// The watermark used for cursor comparisons.
    pub fn watermark(&self) -> DateTime<Utc> {
        effective_watermark(self.server_updated_at, self.record.updated_at)
    }
}

impl FileRow {
    /// The watermark used for cursor comparisons.
    pub fn watermark(&self) -> DateTime<Utc> {
        effective_watermark(self.server_updated_at, self.record.updated_at)
    }
}

impl TagRow {
    /// The watermark used for cursor comparisons.
    pub fn watermark(&self) -> DateTime<Utc> {
        effective_watermark(self.server_updated_at, self.record.updated_at)
    }
}

fn effective_watermark(
    server: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    server.or(updated).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Merges an incoming file record into the stored one.
///
/// File merges are field-level conservative, unlike the whole-row
/// last-write-wins used for the other kinds:
/// - an empty incoming name/type never blanks a non-empty stored one
/// - a zero incoming size never overrides a nonzero stored one
/// - `is_uploaded` is OR'ed; an upload, once recorded, stays recorded
/// - the blob key fills in only while the row has none
/// - a missing incoming created-time keeps the stored one
///
/// The note reference and the client update time always take the incoming
/// value.
pub(crate) fn merge_file(existing: &FileMeta, incoming: FileMeta) -> FileMeta {
    FileMeta {
        id: incoming.id,
        note_id: incoming.note_id,
        name: if incoming.name.is_empty() {
            existing.name.clone()
        } else {
            incoming.name
        },
        media_type: if incoming.media_type.is_empty() {
            existing.media_type.clone()
        } else {
            incoming.media_type
        },
        size: if incoming.size == 0 {
            existing.size
        } else {
            incoming.size
        },
        blob_key: existing.blob_key.clone().or(incoming.blob_key),
        is_uploaded: existing.is_uploaded || incoming.is_uploaded,
        created_at: incoming.created_at.or(existing.created_at),
        updated_at: incoming.updated_at,
        server_updated_at: None,
    }
}
