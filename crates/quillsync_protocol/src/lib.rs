//! # QuillSync Protocol
//!
//! Wire types for the QuillSync synchronization protocol.
//!
//! This crate defines:
//! - The four synchronized entity kinds (notes, folders, files, tags)
//! - The push/pull batch payload ([`SyncBatch`])
//! - Cursor parsing and formatting for incremental pull
//! - Live-stream event types for the change-notification channel
//!
//! All types serialize to camelCase JSON. Tag and attachment blobs are
//! carried as opaque [`serde_json::Value`]s: the server stores and returns
//! them without interpreting their internal shape.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
pub mod cursor;
mod entities;
mod live;

pub use batch::{
    CommitUploadRequest, CommitUploadResponse, PullResponse, PushResponse, SyncBatch,
};
pub use entities::{FileMeta, Folder, Note, Tag};
pub use live::LiveEvent;
