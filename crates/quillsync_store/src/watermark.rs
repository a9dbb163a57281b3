//! The watermark clock.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Assigns server watermarks.
///
/// Watermarks are wall-clock timestamps forced to be strictly increasing:
/// if the system clock has not advanced past the last assignment (or has
/// stepped backwards), the next watermark is the previous one plus one
/// microsecond. A commit boundary is therefore always usable as a cursor
/// that excludes the commit itself.
///
/// Assignments are quantized to whole microseconds. Cursors carry
/// microsecond precision on the wire, so anything finer would make a
/// round-tripped cursor land just before the watermark it names and
/// re-include rows the device has already seen.
pub struct WatermarkClock {
    last: Mutex<DateTime<Utc>>,
}

impl WatermarkClock {
    /// Creates a clock that has assigned nothing yet.
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    /// Returns the next watermark.
    pub fn next(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let now = truncate_to_micros(Utc::now());
        let next = if now > *last {
            now
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }

    /// Returns the most recently assigned watermark, if any.
    pub fn last(&self) -> Option<DateTime<Utc>> {
        let last = *self.last.lock();
        (last != DateTime::<Utc>::UNIX_EPOCH).then_some(last)
    }
}

impl Default for WatermarkClock {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_to_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(t.timestamp_micros()).unwrap_or(t)
}
