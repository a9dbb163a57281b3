//! # QuillSync Server
//!
//! The sync coordinator: the only part of the core exposed to the
//! external request boundary. It orchestrates
//!
//! - **push**: entitlement check, body-size ceiling, JSON decode,
//!   atomic reconciliation into the entity store, then a fire-and-forget
//!   notification fan-out to the user's other live devices
//! - **pull**: cursor/limit resolution and the per-kind incremental query
//! - **live channels**: token-authenticated long-lived event streams that
//!   turn broker signals into "resync needed" events
//! - **file lifecycle**: quota-checked upload commits and permanent note
//!   deletion with blob cleanup
//!
//! Authentication and blob storage are external collaborators, reached
//! through the [`TokenValidator`], [`ProfileDirectory`] and [`BlobStore`]
//! seams. The coordinator trusts the opaque user identifier those hand
//! it; it never inspects credentials itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use quillsync_server::{MemoryBlobStore, MemoryProfiles, ServerConfig, SyncServer};
//!
//! let profiles = MemoryProfiles::new();
//! let blobs = MemoryBlobStore::new();
//! let server = SyncServer::new(ServerConfig::default(), profiles, blobs);
//! server.spawn_maintenance();
//!
//! // Wire handle_push / handle_pull / open_live_session to your HTTP
//! // layer of choice.
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod blobs;
mod config;
mod error;
mod files;
mod live;
mod profiles;
mod query;
mod reconcile;
mod server;

pub use auth::{AuthConfig, TokenValidator};
pub use blobs::{BlobError, BlobInfo, BlobStore, MemoryBlobStore};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use live::{EventSink, LiveSession, SseWriter};
pub use profiles::{MemoryProfiles, Profile, ProfileDirectory};
pub use query::PullParams;
pub use server::SyncServer;
