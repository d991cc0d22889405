//! dump1090 `aircraft.json` model
//!
//! ```json
//! { "now" : 1428032255.8,
//!   "messages" : 36354113,
//!   "aircraft" : [
//!     {"hex":"c07bbe","flight":"WJA584  ","lat":46.006692,"lon":-92.464371,"altitude":37000,"seen":0.2,"rssi":-29.6},
//!     {"hex":"a66c99","squawk":"5361","altitude":5875,"messages":425,"seen":0.1,"rssi":-16.4}
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Recency thresholds in seconds, in bucket order
pub const RECENCY_THRESHOLDS: [f64; 4] = [5.0, 10.0, 30.0, 60.0];

/// Point-in-time dump of the aircraft dump1090 is tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftSnapshot {
    /// Time the file was written, seconds since the epoch
    pub now: f64,
    /// Total messages received since dump1090 started
    pub messages: u64,
    pub aircraft: Vec<AircraftEntry>,
}

/// One aircraft in the snapshot. Only `hex` and `seen` are used.
///
/// dump1090 versions disagree on the types of the other fields (`altitude` is
/// a number or `"ground"`, some builds write fractional rates), so they are
/// kept as raw JSON and never fail the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftEntry {
    /// 24-bit ICAO address in hex
    pub hex: String,
    /// Seconds since the last message from this aircraft
    pub seen: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AircraftSnapshot {
    /// Read and parse an aircraft.json file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Snapshot timestamp formatted for log output
    pub fn timestamp_display(&self) -> String {
        chrono::DateTime::from_timestamp(self.now.trunc() as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| format!("{}", self.now))
    }

    pub fn recency_buckets(&self) -> RecencyBuckets {
        RecencyBuckets::from_aircraft(&self.aircraft)
    }
}

/// Hex codes of aircraft heard within 5, 10, 30 and 60 seconds.
///
/// The sets overlap: an aircraft seen 3 seconds ago is in all four.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecencyBuckets {
    pub within_5s: Vec<String>,
    pub within_10s: Vec<String>,
    pub within_30s: Vec<String>,
    pub within_60s: Vec<String>,
}

impl RecencyBuckets {
    pub fn from_aircraft(aircraft: &[AircraftEntry]) -> Self {
        let mut buckets = Self::default();
        for entry in aircraft {
            let [t5, t10, t30, t60] = RECENCY_THRESHOLDS;
            if entry.seen < t5 {
                buckets.within_5s.push(entry.hex.clone());
            }
            if entry.seen < t10 {
                buckets.within_10s.push(entry.hex.clone());
            }
            if entry.seen < t30 {
                buckets.within_30s.push(entry.hex.clone());
            }
            if entry.seen < t60 {
                buckets.within_60s.push(entry.hex.clone());
            }
        }
        buckets
    }

    /// Bucket sizes in threshold order (5s, 10s, 30s, 60s)
    pub fn sizes(&self) -> [usize; 4] {
        [
            self.within_5s.len(),
            self.within_10s.len(),
            self.within_30s.len(),
            self.within_60s.len(),
        ]
    }
}

#[cfg(test)]
pub(crate) const EXAMPLE_SNAPSHOT: &str = r#"{ "now" : 1428032255.8,
  "messages" : 36354113,
  "aircraft" : [
    {"hex":"c07bbe","flight":"WJA584  ","lat":46.006692,"lon":-92.464371,"nucp":6,"seen_pos":0.2,"altitude":37000,"vert_rate":0,"track":108,"speed":494,"messages":22,"seen":0.2,"rssi":-29.6},
    {"hex":"a66c99","squawk":"5361","altitude":5875,"messages":425,"seen":0.1,"rssi":-16.4},
    {"hex":"a51d90","squawk":"6261","flight":"FDX1683 ","lat":42.988495,"lon":-87.817298,"nucp":0,"seen_pos":1.3,"altitude":4125,"vert_rate":1856,"messages":515,"seen":0.0,"rssi":-12.4}
  ]
}"#;
