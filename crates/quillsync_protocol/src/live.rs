//! Live-stream event types.
//!
//! The live channel is a server-to-client event stream carrying exactly
//! three event shapes. The resync event has no payload beyond its
//! occurrence: a device that receives one always re-pulls current state.

/// An event on the live-update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveEvent {
    /// Zero-payload acknowledgment sent once when the stream opens.
    Connected,
    /// Comment-only keep-alive so intermediaries do not drop the
    /// connection as idle.
    KeepAlive,
    /// Something changed for this user; the device should pull.
    ResyncNeeded,
}

impl LiveEvent {
    /// Renders the event as a text/event-stream frame.
    ///
    /// `Connected` and `KeepAlive` are SSE comments (ignored by event
    /// listeners, but they keep the transport warm); `ResyncNeeded` is the
    /// only data event.
    pub fn render(&self) -> &'static str {
        match self {
            LiveEvent::Connected => ": connected\n\n",
            LiveEvent::KeepAlive => ": keep-alive\n\n",
            LiveEvent::ResyncNeeded => "data: sync_needed\n\n",
        }
    }

    /// Returns true if this event carries data (as opposed to a comment).
    pub fn is_data(&self) -> bool {
        matches!(self, LiveEvent::ResyncNeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_terminated() {
        for event in [
            LiveEvent::Connected,
            LiveEvent::KeepAlive,
            LiveEvent::ResyncNeeded,
        ] {
            assert!(event.render().ends_with("\n\n"));
        }
    }

    #[test]
    fn only_resync_is_data() {
        assert!(LiveEvent::ResyncNeeded.is_data());
        assert!(!LiveEvent::Connected.is_data());
        assert!(!LiveEvent::KeepAlive.is_data());
        assert!(LiveEvent::ResyncNeeded.render().starts_with("data:"));
    }
}
