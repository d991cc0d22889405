//! Forward dump1090 telemetry to statsd.
//!
//! Two programs are built on top of this library:
//!
//! - `aircraft-to-statsd` polls dump1090's `aircraft.json` on a fixed interval,
//!   derives the message rate and the set of recently heard aircraft, and
//!   submits them to statsd.
//! - `dump1090-to-statsd` is run from cron, reads the one minute window of
//!   `stats.json` and forwards the decoder statistics as gauges and timers.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod logging;
pub mod metrics;
pub mod poller;
pub mod snapshot;
pub mod stats;
pub mod statsd;


pub use config::RadioConfig;
pub use error::InputError;
pub use error::check_input_file;
pub use forwarder::ForwardOutcome;
pub use forwarder::StatsForwarder;
pub use metrics::{PollerMetrics, PollerMetricsSnapshot};
pub use poller::{AircraftPoller, PollOutcome, PollState, RateSample};
pub use snapshot::{AircraftEntry, AircraftSnapshot, RecencyBuckets};
pub use stats::{StatsFile, StatsWindow, WindowName};
pub use statsd::{Metric, MetricSink, Pipeline, StatsdClient, UdpSink};
