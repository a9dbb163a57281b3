//! Live channel sessions.
//!
//! A [`LiveSession`] pairs one broker subscription with one outbound
//! event sink and pumps signals between them until either side goes
//! away. The sink is a seam: the wire format is server-sent events via
//! [`SseWriter`], but tests (and alternative transports) plug in their
//! own.

use quillsync_broker::{Signal, Subscription};
use quillsync_protocol::LiveEvent;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, MissedTickBehavior};

/// Outbound half of a live channel.
pub trait EventSink: Send {
    /// Delivers one event to the connected device.
    fn send(&mut self, event: LiveEvent) -> impl Future<Output = io::Result<()>> + Send;
}

/// [`EventSink`] that renders events as `text/event-stream` frames.
pub struct SseWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> SseWriter<W> {
    /// Wraps a writer. The caller has already sent response headers with
    /// `Content-Type: text/event-stream`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwraps the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> EventSink for SseWriter<W> {
    async fn send(&mut self, event: LiveEvent) -> io::Result<()> {
        self.writer.write_all(event.render().as_bytes()).await?;
        // Each frame must reach the device promptly; SSE is useless
        // sitting in a buffer.
        self.writer.flush().await
    }
}

/// One device's live connection, ready to be pumped.
pub struct LiveSession {
    subscription: Subscription,
    keepalive_interval: Duration,
}

impl LiveSession {
    pub(crate) fn new(subscription: Subscription, keepalive_interval: Duration) -> Self {
        Self {
            subscription,
            keepalive_interval,
        }
    }

    /// The user this session belongs to.
    pub fn user(&self) -> &str {
        self.subscription.user()
    }

    /// Pumps events into the sink until the channel closes.
    ///
    /// Emits `Connected` immediately, then translates broker signals:
    /// `Resync` becomes a `ResyncNeeded` data event, broker heartbeats
    /// and local keep-alive ticks both become `KeepAlive` comments.
    /// Returns `Ok` when the channel is closed (eviction, stale sweep,
    /// shutdown) and `Err` when the sink fails, meaning the device went
    /// away.
    pub async fn run<S: EventSink>(mut self, sink: &mut S) -> io::Result<()> {
        sink.send(LiveEvent::Connected).await?;
        let mut keepalive = tokio::time::interval_at(
            Instant::now() + self.keepalive_interval,
            self.keepalive_interval,
        );
        // One comment per quiet interval; a stalled loop owes no backlog.
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                signal = self.subscription.recv() => match signal {
                    Some(Signal::Resync) => sink.send(LiveEvent::ResyncNeeded).await?,
                    Some(Signal::Heartbeat) => sink.send(LiveEvent::KeepAlive).await?,
                    None => return Ok(()),
                },
                _ = keepalive.tick() => sink.send(LiveEvent::KeepAlive).await?,
            }
        }
    }
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("user", &self.subscription.user())
            .field("keepalive_interval", &self.keepalive_interval)
            .finish_non_exhaustive()
    }
}
