//! # QuillSync Store
//!
//! The entity store adapter: typed, owner-scoped read/write access to the
//! four synchronized collections (notes, folders, files, tags).
//!
//! Every row carries a server-assigned watermark. The watermark is set by
//! the store on every write through a monotone clock and is never accepted
//! from clients; it is what makes incremental pull ("everything with a
//! watermark past cursor X") work.
//!
//! # Atomicity
//!
//! Writes go through [`MemoryStore::apply`], which stages the whole batch
//! against a read view and commits it under one write-lock scope. A
//! mid-batch failure leaves the store untouched.
//!
//! # Ownership
//!
//! Identifiers are client-generated, so two users can collide on the same
//! id. The upsert path checks the existing row's owner at the data layer
//! and silently drops cross-owner writes; the rest of the batch still
//! commits.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod store;
mod tables;
mod watermark;

pub use error::{StoreError, StoreResult};
pub use store::{MemoryStore, Transaction, UpsertOutcome};
pub use tables::{FileRow, FolderRow, NoteRow, TagRow};
pub use watermark::WatermarkClock;
