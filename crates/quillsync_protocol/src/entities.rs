//! The four synchronized entity kinds.
//!
//! Identifiers are client-generated opaque strings. Every entity carries a
//! client-supplied `updatedAt` (device-local edit time, display only) and,
//! on pull responses, a server-assigned `serverUpdatedAt` watermark. The
//! watermark is never accepted from clients as authoritative; the store
//! overwrites it on every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

/// A note: the primary user-visible document.
///
/// Deletion is soft: a deleted note is a normal row with `isDeleted` set.
/// Permanent removal goes through the explicit delete operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Client-generated stable identifier.
    pub id: String,
    /// Optional parent folder reference.
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Title line.
    #[serde(default)]
    pub title: String,
    /// Body content.
    #[serde(default)]
    pub content: String,
    /// Pinned to the top of listings.
    #[serde(default)]
    pub is_pinned: bool,
    /// Moved to the archive.
    #[serde(default)]
    pub is_archived: bool,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_deleted: bool,
    /// Display color.
    #[serde(default)]
    pub color: String,
    /// Cover-image reference.
    #[serde(default)]
    pub cover_image: String,
    /// Opaque tag list; stored and returned verbatim.
    #[serde(default = "empty_array")]
    pub tags: Value,
    /// Opaque attachment list; stored and returned verbatim.
    #[serde(default = "empty_array")]
    pub attachments: Value,
    /// Client-side creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Client-side last edit time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Server watermark; set by the store, present on pull responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Creates a note with the given identifier and empty fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            folder_id: None,
            title: String::new(),
            content: String::new(),
            is_pinned: false,
            is_archived: false,
            is_deleted: false,
            color: String::new(),
            cover_image: String::new(),
            tags: empty_array(),
            attachments: empty_array(),
            created_at: None,
            updated_at: None,
            server_updated_at: None,
        }
    }
}

/// A folder in the self-referential folder tree.
///
/// The server does not validate the tree for cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Client-generated stable identifier.
    pub id: String,
    /// Optional parent folder reference.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Folder name.
    #[serde(default)]
    pub name: String,
    /// Display color.
    #[serde(default)]
    pub color: String,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_deleted: bool,
    /// Client-side last edit time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Server watermark; set by the store, present on pull responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_updated_at: Option<DateTime<Utc>>,
}

impl Folder {
    /// Creates a folder with the given identifier and empty fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            name: String::new(),
            color: String::new(),
            is_deleted: false,
            updated_at: None,
            server_updated_at: None,
        }
    }
}

/// Metadata for an attached file.
///
/// The bytes themselves live in an external blob store; the sync engine
/// only tracks metadata, the blob key, and whether the upload has been
/// confirmed. The `isUploaded` flag, once recorded, cannot be cleared by a
/// later push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Client-generated stable identifier.
    pub id: String,
    /// Optional owning note reference.
    #[serde(default)]
    pub note_id: Option<String>,
    /// Logical file name.
    #[serde(default)]
    pub name: String,
    /// MIME-like type string.
    #[serde(rename = "type", default)]
    pub media_type: String,
    /// Byte size.
    #[serde(default)]
    pub size: i64,
    /// Key of the blob in the external blob store, once known.
    #[serde(default)]
    pub blob_key: Option<String>,
    /// True once the blob has been confirmed present in the blob store.
    #[serde(default)]
    pub is_uploaded: bool,
    /// Client-side creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Client-side last edit time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Server watermark; set by the store, present on pull responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_updated_at: Option<DateTime<Utc>>,
}

impl FileMeta {
    /// Creates file metadata with the given identifier and empty fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            note_id: None,
            name: String::new(),
            media_type: String::new(),
            size: 0,
            blob_key: None,
            is_uploaded: false,
            created_at: None,
            updated_at: None,
            server_updated_at: None,
        }
    }
}

/// A tag label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Client-generated stable identifier.
    pub id: String,
    /// Tag name.
    #[serde(default)]
    pub name: String,
    /// Display color.
    #[serde(default)]
    pub color: String,
    /// Client-side last edit time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Server watermark; set by the store, present on pull responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_updated_at: Option<DateTime<Utc>>,
}

impl Tag {
    /// Creates a tag with the given identifier and empty fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            color: String::new(),
            updated_at: None,
            server_updated_at: None,
        }
    }
}
