//! Mapping of P2PQuake earthquake frames onto the relay's [`Event`].

use std::collections::BTreeSet;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use namazu_types::{Event, EventType};

use crate::frame::EarthquakeFrame;

/// Source timestamps are Japan Standard Time.
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// `%.f` also accepts timestamps without a fractional part.
const SOURCE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";

/// Normalized 0-100 severity for a JMA intensity code. Unknown codes map to 0.
pub fn severity_from_scale(scale: i32) -> u8 {
    match scale {
        10 => 10,  // 震度1
        20 => 20,  // 震度2
        30 => 30,  // 震度3
        40 => 40,  // 震度4
        45 => 50,  // 震度5弱
        50 => 60,  // 震度5強
        55 => 70,  // 震度6弱
        60 => 80,  // 震度6強
        70 => 100, // 震度7
        _ => 0,
    }
}

/// Parse a `YYYY/MM/DD HH:MM:SS[.fff]` JST timestamp.
pub fn parse_source_time(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), SOURCE_TIME_FORMAT).ok()?;
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS)?;
    jst.from_local_datetime(&naive)
        .single()
        .map(|time| time.with_timezone(&Utc))
}

/// Build an [`Event`] from a decoded earthquake frame.
///
/// `raw` must be the frame exactly as received.
pub fn normalize(
    frame: &EarthquakeFrame,
    id: &str,
    source: &str,
    raw: Bytes,
    received_at: DateTime<Utc>,
) -> Event {
    let earthquake = frame.earthquake.as_ref();

    let severity = earthquake
        .and_then(|eq| eq.max_scale)
        .map(severity_from_scale)
        .unwrap_or(0);

    let occurred_at = earthquake
        .and_then(|eq| eq.time.as_deref())
        .and_then(parse_source_time)
        .or_else(|| frame.time.as_deref().and_then(parse_source_time));

    let affected_areas: BTreeSet<String> = frame
        .points
        .iter()
        .map(|point| point.prefecture.trim())
        .filter(|prefecture| !prefecture.is_empty())
        .map(str::to_string)
        .collect();

    Event {
        id: id.to_string(),
        event_type: EventType::Earthquake,
        source: source.to_string(),
        severity,
        affected_areas,
        occurred_at,
        received_at,
        raw,
    }
}
