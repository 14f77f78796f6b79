//! The normalized earthquake event.

use std::collections::BTreeSet;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of event kinds the relay emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Seismic intensity report
    Earthquake,
}

impl EventType {
    /// Wire tag for this event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Earthquake => "earthquake",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized event, immutable once built by the stream normalizer.
///
/// `raw` carries the upstream frame exactly as it arrived. Subscribers receive
/// those bytes verbatim, which keeps their signature checks stable no matter
/// how normalization evolves. Only when `raw` is empty is the event re-encoded
/// as JSON, and the signature then covers that re-encoding instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier assigned by the upstream source
    pub id: String,
    /// Kind of event
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Origin tag, e.g. `p2pquake`
    pub source: String,
    /// Normalized severity, 0 (unknown) to 100
    pub severity: u8,
    /// Distinct region names touched by the event
    pub affected_areas: BTreeSet<String>,
    /// When the event happened; `None` when the source time was unusable
    pub occurred_at: Option<DateTime<Utc>>,
    /// When the relay received the frame
    pub received_at: DateTime<Utc>,
    /// Original upstream payload
    #[serde(skip)]
    pub raw: Bytes,
}

impl Event {
    /// Bytes to deliver to subscribers.
    ///
    /// Returns the original upstream frame when present, otherwise the event
    /// encoded as JSON.
    pub fn payload(&self) -> Result<Bytes, serde_json::Error> {
        if !self.raw.is_empty() {
            return Ok(self.raw.clone());
        }
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Whether any of `regions` is among this event's affected areas.
    pub fn touches_any<'a, I>(&self, regions: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        regions
            .into_iter()
            .any(|region| self.affected_areas.contains(region))
    }
}
