//! dump1090 `stats.json` model
//!
//! dump1090 rewrites stats.json once a minute. The file holds several
//! aggregation windows (`latest`, `last1min`, `last5min`, `last15min`,
//! `total`) that share the same layout:
//!
//! ```json
//! { "last1min": {
//!     "start": 1428032160.0, "end": 1428032220.0,
//!     "local": { "blocks_processed": 1831, "blocks_dropped": 0, "modeac": 0, "modes": 2958711,
//!                "bad": 2876403, "unknown_icao": 56318, "accepted": [24947, 1043],
//!                "strong_signals": 31 },
//!     "cpr": { "surface": 0, "airborne": 4261, "global_ok": 4023, ... },
//!     "messages": 25990,
//!     "tracks": { "all": 38, "single_message": 12 },
//!     "cpu": { "demod": 5240, "reader": 1118, "background": 61 } } }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Aggregation window inside stats.json
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WindowName {
    Latest,
    #[default]
    #[value(name = "last1min")]
    Last1Min,
    #[value(name = "last5min")]
    Last5Min,
    #[value(name = "last15min")]
    Last15Min,
    Total,
}

impl WindowName {
    pub fn key(&self) -> &'static str {
        match self {
            WindowName::Latest => "latest",
            WindowName::Last1Min => "last1min",
            WindowName::Last5Min => "last5min",
            WindowName::Last15Min => "last15min",
            WindowName::Total => "total",
        }
    }
}

impl fmt::Display for WindowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Local receiver counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStats {
    /// Messages accepted with 0, 1 (and with aggressive mode 2) corrected bits
    pub accepted: Vec<u64>,
    pub bad: u64,
    pub blocks_dropped: u64,
    pub blocks_processed: u64,
    pub modeac: u64,
    pub modes: u64,
    pub strong_signals: u64,
    pub unknown_icao: u64,
}

/// Compact position report decoding counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CprStats {
    pub airborne: u64,
    pub filtered: u64,
    pub global_bad: u64,
    pub global_ok: u64,
    pub global_range: u64,
    pub global_skipped: u64,
    pub global_speed: u64,
    pub local_aircraft_relative: u64,
    pub local_ok: u64,
    pub local_range: u64,
    pub local_receiver_relative: u64,
    pub local_skipped: u64,
    pub local_speed: u64,
    pub surface: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackStats {
    pub all: u64,
    pub single_message: u64,
}

/// Milliseconds of CPU spent per decoder thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuStats {
    pub background: f64,
    pub demod: f64,
    pub reader: f64,
}

/// One aggregation window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsWindow {
    pub local: LocalStats,
    pub cpr: CprStats,
    pub messages: u64,
    pub tracks: TrackStats,
    pub cpu: CpuStats,
}

/// Parsed stats.json, keyed by window name
#[derive(Debug, Clone)]
pub struct StatsFile {
    windows: Map<String, Value>,
}

impl StatsFile {
    /// Read and parse a stats.json file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        match serde_json::from_str(data)? {
            Value::Object(windows) => Ok(Self { windows }),
            other => bail!("Expected a JSON object, found {}", json_kind(&other)),
        }
    }

    /// Decode a single aggregation window
    pub fn window(&self, name: WindowName) -> Result<StatsWindow> {
        let value = self
            .windows
            .get(name.key())
            .with_context(|| format!("stats.json has no \"{}\" window", name))?;
        StatsWindow::deserialize(value)
            .with_context(|| format!("Malformed \"{}\" window in stats.json", name))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub(crate) const EXAMPLE_STATS: &str = r#"{
  "latest": { "start": 1428032250.0, "end": 1428032255.0, "messages": 2100 },
  "last1min": {
    "start": 1428032160.0,
    "end": 1428032220.0,
    "local": {
      "blocks_processed": 1831, "blocks_dropped": 2, "modeac": 0, "modes": 2958711,
      "bad": 2876403, "unknown_icao": 56318, "accepted": [24947, 1043],
      "signal": -18.7, "noise": -32.1, "peak_signal": -2.3, "strong_signals": 31
    },
    "remote": { "modeac": 0, "modes": 0, "bad": 0, "unknown_icao": 0, "accepted": [0, 0] },
    "cpr": {
      "surface": 3, "airborne": 4261, "global_ok": 4023, "global_bad": 1, "global_range": 2,
      "global_speed": 4, "global_skipped": 95, "local_ok": 131, "local_aircraft_relative": 120,
      "local_receiver_relative": 11, "local_skipped": 110, "local_range": 5, "local_speed": 6,
      "filtered": 7
    },
    "cpu": { "demod": 5240, "reader": 1118, "background": 61 },
    "tracks": { "all": 38, "single_message": 12 },
    "messages": 25990
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last1min() {
        let stats = StatsFile::from_json(EXAMPLE_STATS).unwrap();
        let window = stats.window(WindowName::Last1Min).unwrap();

        assert_eq!(window.local.accepted, vec![24947, 1043]);
        assert_eq!(window.local.blocks_dropped, 2);
        assert_eq!(window.cpr.global_ok, 4023);
        assert_eq!(window.messages, 25990);
        assert_eq!(window.tracks.single_message, 12);
        assert_eq!(window.cpu.demod, 5240.0);
    }

    #[test]
    fn test_incomplete_window_is_an_error() {
        let stats = StatsFile::from_json(EXAMPLE_STATS).unwrap();
        let err = stats.window(WindowName::Latest).unwrap_err();
        assert!(err.to_string().contains("Malformed \"latest\" window"));
    }

    #[test]
    fn test_missing_window_is_an_error() {
        let stats = StatsFile::from_json(EXAMPLE_STATS).unwrap();
        let err = stats.window(WindowName::Total).unwrap_err();
        assert!(err.to_string().contains("no \"total\" window"));
    }

    #[test]
    fn test_top_level_must_be_an_object() {
        let err = StatsFile::from_json("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("found an array"));
    }
}
