//! Wire shapes of P2PQuake JSON frames.
//!
//! Only the fields the relay reads are modelled; everything else in a frame
//! is ignored on decode and survives untouched in the raw bytes.

use serde::Deserialize;

/// Frame code of earthquake intensity reports.
pub const EARTHQUAKE_CODE: i64 = 551;

/// Discriminator shared by every frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub code: i64,
}

/// A `code = 551` earthquake report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EarthquakeFrame {
    #[serde(rename = "_id", default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    /// Time the upstream relayed the report, JST
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub earthquake: Option<Earthquake>,
    #[serde(default)]
    pub points: Vec<ObservationPoint>,
}

impl EarthquakeFrame {
    /// Stable identifier, preferring `_id` over `id`. Empty values count as
    /// absent.
    pub fn stable_id(&self) -> Option<&str> {
        self.object_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.id.as_deref().filter(|id| !id.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Earthquake {
    /// Origin time, `YYYY/MM/DD HH:MM:SS` in JST
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub hypocenter: Option<Hypocenter>,
    /// Maximum observed intensity code; `-1` when not yet known
    #[serde(rename = "maxScale", default)]
    pub max_scale: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hypocenter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub magnitude: Option<f64>,
}

/// One intensity observation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservationPoint {
    #[serde(alias = "pref", default)]
    pub prefecture: String,
    #[serde(alias = "addr", default)]
    pub name: String,
    #[serde(default)]
    pub scale: Option<i32>,
    #[serde(rename = "isArea", default)]
    pub is_area: bool,
}
