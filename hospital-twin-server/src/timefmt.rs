//! ISO-8601 <-> epoch-millisecond conversions at the HTTP boundary. The core
//! crate only ever sees `Timestamp` (epoch ms); spec.md §6 requires ISO-8601
//! on the wire, so the translation lives here rather than leaking into
//! `hospital-twin-core`.

use chrono::{DateTime, Utc};
use hospital_twin_core::error::SimError;
use hospital_twin_core::types::Timestamp;

/// The documented replay anchor: used whenever a caller omits
/// `start_time`.
pub fn default_replay_anchor() -> Timestamp {
    // 2026-01-15T00:00:00Z
    1_768_435_200_000
}

pub fn now_ms() -> Timestamp {
    Utc::now().timestamp_millis()
}

pub fn parse_iso8601(value: &str) -> Result<Timestamp, SimError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| SimError::InvalidParameter(format!("invalid ISO-8601 timestamp {value:?}: {e}")))
}

pub fn to_iso8601(ms: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(|| Utc::now())
        .to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_rfc3339() {
        let original = "2026-01-15T00:00:00+00:00";
        let ms = parse_iso8601(original).unwrap();
        assert_eq!(ms, default_replay_anchor());
        assert_eq!(to_iso8601(ms), original);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_iso8601("not-a-timestamp").is_err());
    }
}
