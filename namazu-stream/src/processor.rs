//! Per-frame decode, filter and dedup step of the read loop.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use namazu_types::Event;

use crate::cache::SeenIdCache;
use crate::error::FrameError;
use crate::frame::{EarthquakeFrame, Envelope, EARTHQUAKE_CODE};
use crate::normalizer::normalize;

/// What became of one upstream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// A new earthquake event to emit
    Event(Event),
    /// A frame with a code other than 551
    Ignored { code: i64 },
    /// An earthquake frame whose id was seen recently
    Duplicate { id: String },
}

/// Turns raw frames into events, remembering ids across reconnects.
///
/// One processor lives for the whole life of a stream client, so its cache
/// spans every connection the client makes.
#[derive(Debug)]
pub struct FrameProcessor {
    cache: SeenIdCache,
    source: String,
}

impl FrameProcessor {
    pub fn new(source: impl Into<String>, cache_capacity: usize) -> Self {
        Self {
            cache: SeenIdCache::new(cache_capacity),
            source: source.into(),
        }
    }

    /// Decode `raw` and decide whether it yields a new event.
    pub fn process(
        &mut self,
        raw: Bytes,
        received_at: DateTime<Utc>,
    ) -> Result<FrameOutcome, FrameError> {
        let envelope: Envelope = serde_json::from_slice(&raw)?;
        if envelope.code != EARTHQUAKE_CODE {
            return Ok(FrameOutcome::Ignored {
                code: envelope.code,
            });
        }

        let frame: EarthquakeFrame = serde_json::from_slice(&raw)?;
        let id = frame.stable_id().ok_or(FrameError::MissingId)?;

        if !self.cache.insert(id) {
            return Ok(FrameOutcome::Duplicate { id: id.to_string() });
        }

        Ok(FrameOutcome::Event(normalize(
            &frame,
            id,
            &self.source,
            raw,
            received_at,
        )))
    }

    pub fn seen(&self) -> &SeenIdCache {
        &self.cache
    }
}
