//! Cursor parsing and formatting.
//!
//! A cursor is an opaque watermark value: everything at or before it has
//! already been seen by the pulling device. On the wire it is an RFC 3339
//! timestamp; a device that has never synced uses the Unix epoch.

use chrono::{DateTime, SecondsFormat, Utc};

/// The lowest possible cursor: the Unix epoch.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Parses a cursor string.
///
/// Returns `None` for an empty or malformed value. Callers decide whether
/// that means "default to the epoch" (absent cursor) or "reject the
/// request" (present but unparseable).
pub fn parse_cursor(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Formats a watermark as a cursor string.
///
/// Microsecond precision: the store assigns watermarks at microsecond
/// granularity, so anything coarser would round-trip lossily.
pub fn format_cursor(watermark: DateTime<Utc>) -> String {
    watermark.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_lowest() {
        assert_eq!(epoch().timestamp(), 0);
    }

    #[test]
    fn round_trip() {
        let now = Utc::now();
        let parsed = parse_cursor(&format_cursor(now)).unwrap();
        // Formatting truncates below microseconds.
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn empty_and_garbage() {
        assert!(parse_cursor("").is_none());
        assert!(parse_cursor("not-a-timestamp").is_none());
    }

    #[test]
    fn offset_normalized_to_utc() {
        let parsed = parse_cursor("2024-06-01T12:00:00+02:00").unwrap();
        assert_eq!(format_cursor(parsed), "2024-06-01T10:00:00.000000Z");
    }
}
