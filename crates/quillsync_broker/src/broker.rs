//! The notification broker.

use crate::config::{BrokerConfig, CapacityPolicy};
use crate::error::{BrokerError, BrokerResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use std::fmt;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// A signal delivered on a subscriber channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Another device pushed; the subscriber should pull.
    Resync,
    /// Maintenance heartbeat; keeps the transport from looking dead.
    Heartbeat,
}

struct ChannelEntry {
    tx: mpsc::Sender<Signal>,
    last_active: Mutex<Instant>,
    // Held for the channel's lifetime; dropping the entry frees the
    // global-cap slot exactly once, on every removal path.
    _permit: Option<OwnedSemaphorePermit>,
}

struct Inner {
    config: BrokerConfig,
    channels: RwLock<HashMap<String, HashMap<Uuid, ChannelEntry>>>,
    capacity: Option<Arc<Semaphore>>,
    shutdown: watch::Sender<bool>,
}

impl Inner {
    fn evict_if_full(&self, user: &str) {
        let max = self.config.max_devices_per_user;
        if max == 0 {
            return;
        }
        let mut channels = self.channels.write();
        let Some(user_channels) = channels.get_mut(user) else {
            return;
        };
        if user_channels.len() < max {
            return;
        }
        let oldest = user_channels
            .iter()
            .min_by_key(|(_, entry)| *entry.last_active.lock())
            .map(|(id, _)| *id);
        if let Some(oldest) = oldest {
            // Dropping the entry closes the channel and releases its
            // global-cap slot.
            user_channels.remove(&oldest);
            tracing::debug!(user, channel = %oldest, "evicted oldest live channel");
        }
    }

    fn remove(&self, user: &str, id: Uuid) {
        let mut channels = self.channels.write();
        if let Some(user_channels) = channels.get_mut(user) {
            user_channels.remove(&id);
            if user_channels.is_empty() {
                channels.remove(user);
            }
        }
    }

    fn send_heartbeats(&self) {
        let half = self.config.stale_timeout / 2;
        let now = Instant::now();
        let channels = self.channels.read();
        for user_channels in channels.values() {
            for entry in user_channels.values() {
                let silent = {
                    let last = entry.last_active.lock();
                    now.duration_since(*last)
                };
                if silent < half {
                    continue;
                }
                // A full buffer means the subscriber has an unconsumed
                // signal already; leave it for the stale sweep to judge.
                if entry.tx.try_send(Signal::Heartbeat).is_ok() {
                    *entry.last_active.lock() = now;
                }
            }
        }
    }

    fn sweep_stale(&self) {
        let timeout = self.config.stale_timeout;
        let now = Instant::now();
        let mut channels = self.channels.write();
        let mut evicted = 0usize;
        for user_channels in channels.values_mut() {
            user_channels.retain(|_, entry| {
                let stale = now.duration_since(*entry.last_active.lock()) > timeout;
                if stale {
                    evicted += 1;
                }
                !stale
            });
        }
        channels.retain(|_, user_channels| !user_channels.is_empty());
        if evicted > 0 {
            tracing::debug!(evicted, "swept stale live channels");
        }
    }
}

/// Fans a one-bit "resync" signal out to every live channel of a user.
///
/// Cheap to clone; clones share the same channel registry.
#[derive(Clone)]
pub struct NotificationBroker {
    inner: Arc<Inner>,
}

impl NotificationBroker {
    /// Creates a broker. Call [`spawn_maintenance`](Self::spawn_maintenance)
    /// once from within a tokio runtime to start heartbeating and stale
    /// cleanup.
    pub fn new(config: BrokerConfig) -> Self {
        let capacity = config
            .max_total_connections
            .map(|max| Arc::new(Semaphore::new(max)));
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                channels: RwLock::new(HashMap::new()),
                capacity,
                shutdown,
            }),
        }
    }

    /// Registers a new live channel for a user.
    ///
    /// If a global cap is configured and saturated, this either waits for
    /// a slot or fails, per the configured [`CapacityPolicy`]. If the
    /// user is at their device cap, the least-recently-active channel is
    /// evicted (closed, slot released) to admit the new one.
    pub async fn subscribe(&self, user: &str) -> BrokerResult<Subscription> {
        if *self.inner.shutdown.borrow() {
            return Err(BrokerError::ShutDown);
        }

        // Evict before touching the global cap. The evicted channel's
        // permit must already be released, otherwise this subscriber
        // would wait on (or be rejected over) a slot its own admission
        // is about to free.
        self.inner.evict_if_full(user);

        let permit = match &self.inner.capacity {
            Some(semaphore) => match self.inner.config.capacity_policy {
                CapacityPolicy::Wait => Some(
                    Arc::clone(semaphore)
                        .acquire_owned()
                        .await
                        .map_err(|_| BrokerError::ShutDown)?,
                ),
                CapacityPolicy::Reject => Some(
                    Arc::clone(semaphore)
                        .try_acquire_owned()
                        .map_err(|_| BrokerError::AtCapacity)?,
                ),
            },
            None => None,
        };

        let (tx, rx) = mpsc::channel(1);
        let id = Uuid::new_v4();
        let max_devices = self.inner.config.max_devices_per_user;

        let mut channels = self.inner.channels.write();
        let user_channels = channels.entry(user.to_string()).or_default();
        if max_devices > 0 && user_channels.len() >= max_devices {
            // A racing subscriber refilled the cap while this one waited
            // on the global permit.
            let oldest = user_channels
                .iter()
                .min_by_key(|(_, entry)| *entry.last_active.lock())
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                user_channels.remove(&oldest);
                tracing::debug!(user, channel = %oldest, "evicted oldest live channel");
            }
        }
        user_channels.insert(
            id,
            ChannelEntry {
                tx,
                last_active: Mutex::new(Instant::now()),
                _permit: permit,
            },
        );
        drop(channels);

        Ok(Subscription {
            user: user.to_string(),
            id,
            rx,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Signals every live channel of a user. Never fails and never
    /// blocks: a channel whose single-slot buffer is full is skipped.
    pub fn notify(&self, user: &str) {
        let channels = self.inner.channels.read();
        let Some(user_channels) = channels.get(user) else {
            return;
        };
        for entry in user_channels.values() {
            if entry.tx.try_send(Signal::Resync).is_ok() {
                *entry.last_active.lock() = Instant::now();
            }
        }
    }

    /// Starts the single background maintenance task: heartbeats every
    /// half staleness timeout, stale sweep every full timeout. Runs until
    /// [`shutdown`](Self::shutdown).
    pub fn spawn_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            let timeout = inner.config.stale_timeout;
            let half = timeout / 2;
            let mut heartbeat = tokio::time::interval_at(Instant::now() + half, half);
            let mut sweep = tokio::time::interval_at(Instant::now() + timeout, timeout);
            // A delayed tick means the work is late, not owed several
            // times over.
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
            sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = heartbeat.tick() => inner.send_heartbeats(),
                    _ = sweep.tick() => inner.sweep_stale(),
                }
            }
        })
    }

    /// Stops maintenance and closes every live channel.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        self.inner.channels.write().clear();
    }

    /// Number of live channels for one user.
    pub fn channel_count(&self, user: &str) -> usize {
        self.inner
            .channels
            .read()
            .get(user)
            .map_or(0, |user_channels| user_channels.len())
    }

    /// Number of live channels across all users.
    pub fn total_channels(&self) -> usize {
        self.inner
            .channels
            .read()
            .values()
            .map(|user_channels| user_channels.len())
            .sum()
    }

    /// Number of users with at least one live channel.
    pub fn user_count(&self) -> usize {
        self.inner.channels.read().len()
    }
}

/// A live signal channel held by one device connection.
///
/// Dropping the subscription unsubscribes it; unsubscription is
/// idempotent with respect to eviction and stale sweeps, and a
/// global-cap slot is never released twice.
pub struct Subscription {
    user: String,
    id: Uuid,
    rx: mpsc::Receiver<Signal>,
    inner: Arc<Inner>,
}

impl Subscription {
    /// The user this channel belongs to.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The channel handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next signal. Returns `None` once the channel has
    /// been closed (eviction, stale sweep, or broker shutdown).
    pub async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }

    /// Returns an already-buffered signal without waiting.
    pub fn try_recv(&mut self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }

    /// Explicitly unsubscribes. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.remove(&self.user, self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("user", &self.user)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
