//! # QuillSync Broker
//!
//! The change-notification broker: a fan-out layer that lets every live
//! device of a user learn "something changed" with bounded latency and
//! bounded resource use.
//!
//! Signals carry no payload beyond their occurrence. Delivery is best
//! effort: each subscriber channel holds at most one undelivered signal,
//! and a full channel is skipped because the consumer always pulls
//! current state once it reacts to any signal. The pull path is the
//! ground truth; a lost signal is always recoverable.
//!
//! Resource bounds:
//! - a per-user device cap — subscribing past it evicts the
//!   least-recently-active channel for that user
//! - an optional global connection cap — saturated subscribes either wait
//!   or fail, per configured policy
//! - a single background maintenance task that heartbeats quiet channels
//!   and sweeps stale ones

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod config;
mod error;

pub use broker::{NotificationBroker, Signal, Subscription};
pub use config::{BrokerConfig, CapacityPolicy};
pub use error::{BrokerError, BrokerResult};
