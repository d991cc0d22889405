//! One-shot stats.json forwarder
//!
//! Run once a minute from cron. The file is skipped when dump1090 has not
//! rewritten it recently, so a dead decoder does not keep reporting its last
//! minute forever.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::config::RadioConfig;
use crate::stats::{StatsFile, StatsWindow, WindowName};
use crate::statsd::{Metric, StatsdClient};

/// Metrics per pipeline flush
pub const RADIO_STATS_BATCH_SIZE: usize = 10;

/// Age check of a stats.json file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh(Duration),
    Stale(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The file was too old, nothing was sent
    Stale { age: Duration },
    Sent { age: Duration, metrics: usize },
}

/// Time since `path` was last modified, as seen at `now`.
/// A modification time in the future counts as zero.
pub fn file_age(path: &Path, now: SystemTime) -> Result<Duration> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", path.display()))?;
    Ok(now.duration_since(modified).unwrap_or(Duration::ZERO))
}

/// Build the full metric battery for one stats window
pub fn radio_metrics(config: &RadioConfig, s: &StatsWindow) -> Result<Vec<Metric>> {
    let gauge = |suffix: &str, value: u64| Metric::gauge(config.metric_name(suffix), value as f64);
    let timing = |suffix: &str, value: f64| Metric::timing(config.metric_name(suffix), value);

    let accepted = |idx: usize| {
        s.local
            .accepted
            .get(idx)
            .copied()
            .with_context(|| format!("local.accepted has no entry {}", idx))
    };

    let mut metrics = vec![
        gauge("accepted", accepted(0)?),
        gauge("accepted_corrected", accepted(1)?),
    ];
    // Aggressive mode adds a third entry for two-bit corrections
    if let Some(two_bit) = s.local.accepted.get(2) {
        metrics.push(gauge("accepted_corrected_2bit", *two_bit));
    }

    metrics.extend([
        gauge("bad", s.local.bad),
        gauge("blocks_dropped", s.local.blocks_dropped),
        gauge("blocks_processed", s.local.blocks_processed),
        gauge("modeac", s.local.modeac),
        gauge("modes", s.local.modes),
        gauge("strong_signals", s.local.strong_signals),
        gauge("unknown_icao", s.local.unknown_icao),
        gauge("cpr.airborne", s.cpr.airborne),
        gauge("cpr.filtered", s.cpr.filtered),
        gauge("cpr.global_bad", s.cpr.global_bad),
        gauge("cpr.global_ok", s.cpr.global_ok),
        gauge("cpr.global_range", s.cpr.global_range),
        gauge("cpr.global_skipped", s.cpr.global_skipped),
        gauge("cpr.global_speed", s.cpr.global_speed),
        gauge("cpr.local_aircraft_relative", s.cpr.local_aircraft_relative),
        gauge("cpr.local_ok", s.cpr.local_ok),
        gauge("cpr.local_range", s.cpr.local_range),
        gauge("cpr.local_receiver_relative", s.cpr.local_receiver_relative),
        gauge("cpr.local_skipped", s.cpr.local_skipped),
        gauge("cpr.local_speed", s.cpr.local_speed),
        gauge("cpr.surface", s.cpr.surface),
        gauge("messages", s.messages),
        gauge("tracks_all", s.tracks.all),
        gauge("tracks_single_message", s.tracks.single_message),
        timing("cpu.background", s.cpu.background),
        timing("cpu.demodulation", s.cpu.demod),
        timing("cpu.usb", s.cpu.reader),
    ]);

    Ok(metrics)
}

pub struct StatsForwarder {
    config: RadioConfig,
    window: WindowName,
}

impl StatsForwarder {
    pub fn new(config: RadioConfig) -> Self {
        Self {
            config,
            window: WindowName::default(),
        }
    }

    pub fn with_window(mut self, window: WindowName) -> Self {
        self.window = window;
        self
    }

    /// Compare the file age at `now` against the configured maximum
    pub fn freshness(&self, path: &Path, now: SystemTime) -> Result<Freshness> {
        let age = file_age(path, now)?;
        if age >= self.config.max_stats_age {
            warn!("File is {} seconds old, not sending data", age.as_secs());
            Ok(Freshness::Stale(age))
        } else {
            info!("File is {} seconds old, looks like fresh data", age.as_secs());
            Ok(Freshness::Fresh(age))
        }
    }

    /// Parse `path` and send the selected window. Returns the number of metrics sent.
    pub async fn send(&self, client: &StatsdClient, path: &Path) -> Result<usize> {
        let stats = StatsFile::load(path)?;
        let window = stats.window(self.window)?;
        let metrics = radio_metrics(&self.config, &window)?;

        let mut sent = 0;
        for batch in metrics.chunks(RADIO_STATS_BATCH_SIZE) {
            let mut pipe = client.pipeline();
            for metric in batch {
                pipe.push(metric.clone());
            }
            sent += pipe.send().await?;
        }

        info!(
            "Sent {} {} metrics for radio {} to {}",
            sent,
            self.window,
            self.config.radio_name,
            self.config.statsd_addr()
        );
        Ok(sent)
    }

    /// Freshness check, then connect and [`StatsForwarder::send`].
    ///
    /// `connect` receives the statsd address and is only called for a fresh file.
    pub async fn forward_at<C, Fut>(
        &self,
        path: &Path,
        now: SystemTime,
        connect: C,
    ) -> Result<ForwardOutcome>
    where
        C: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<StatsdClient>>,
    {
        info!("Parsing dump1090 stats.json file for changes: {}", path.display());
        match self.freshness(path, now)? {
            Freshness::Stale(age) => Ok(ForwardOutcome::Stale { age }),
            Freshness::Fresh(age) => {
                let client = connect(self.config.statsd_addr()).await?;
                let metrics = self.send(&client, path).await?;
                Ok(ForwardOutcome::Sent { age, metrics })
            }
        }
    }

    /// Forward `path` as of now to the configured statsd daemon over UDP
    pub async fn forward(&self, path: &Path) -> Result<ForwardOutcome> {
        self.forward_at(path, SystemTime::now(), |addr| async move {
            StatsdClient::connect(&addr).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EXAMPLE_STATS;
    use crate::statsd::MemorySink;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stats_file(contents: &str) -> (tempfile::TempDir, std::path::PathBuf, SystemTime) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, contents).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        (dir, path, modified)
    }

    fn client() -> (StatsdClient, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (StatsdClient::new(sink.clone()), sink)
    }

    #[test]
    fn test_file_age() {
        let (_dir, path, modified) = stats_file("{}");
        let age = file_age(&path, modified + Duration::from_secs(42)).unwrap();
        assert_eq!(age, Duration::from_secs(42));
    }

    #[test]
    fn test_future_mtime_is_zero_age() {
        let (_dir, path, modified) = stats_file("{}");
        let age = file_age(&path, modified - Duration::from_secs(5)).unwrap();
        assert_eq!(age, Duration::ZERO);
    }

    #[test]
    fn test_freshness_threshold_is_inclusive() {
        let (_dir, path, modified) = stats_file("{}");
        let forwarder = StatsForwarder::new(RadioConfig::new("myadsb"));

        assert_eq!(
            forwarder.freshness(&path, modified + Duration::from_secs(59)).unwrap(),
            Freshness::Fresh(Duration::from_secs(59))
        );
        assert_eq!(
            forwarder.freshness(&path, modified + Duration::from_secs(60)).unwrap(),
            Freshness::Stale(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_radio_metrics_without_two_bit_entry() {
        let window = StatsFile::from_json(EXAMPLE_STATS)
            .unwrap()
            .window(WindowName::Last1Min)
            .unwrap();
        let metrics = radio_metrics(&RadioConfig::new("myadsb"), &window).unwrap();

        assert_eq!(metrics.len(), 29);
        assert!(metrics.iter().all(|m| m.name().starts_with("radios.myadsb.")));
        assert!(!metrics.iter().any(|m| m.name().ends_with("accepted_corrected_2bit")));
    }

    #[test]
    fn test_radio_metrics_with_two_bit_entry() {
        let json = EXAMPLE_STATS.replace("[24947, 1043]", "[24947, 1043, 17]");
        let window = StatsFile::from_json(&json)
            .unwrap()
            .window(WindowName::Last1Min)
            .unwrap();
        let metrics = radio_metrics(&RadioConfig::new("myadsb"), &window).unwrap();

        assert_eq!(metrics.len(), 30);
        assert_eq!(metrics[2], Metric::gauge("radios.myadsb.accepted_corrected_2bit", 17.0));
    }

    #[test]
    fn test_short_accepted_array_is_an_error() {
        let json = EXAMPLE_STATS.replace("[24947, 1043]", "[24947]");
        let window = StatsFile::from_json(&json)
            .unwrap()
            .window(WindowName::Last1Min)
            .unwrap();
        assert!(radio_metrics(&RadioConfig::new("myadsb"), &window).is_err());
    }

    #[tokio::test]
    async fn test_stale_file_sends_nothing() {
        let (_dir, path, modified) = stats_file(EXAMPLE_STATS);
        let (client, sink) = client();
        let forwarder = StatsForwarder::new(RadioConfig::new("myadsb"));

        let connects = AtomicUsize::new(0);
        let outcome = forwarder
            .forward_at(&path, modified + Duration::from_secs(61), |_| {
                connects.fetch_add(1, Ordering::Relaxed);
                async { anyhow::Ok(client.clone()) }
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ForwardOutcome::Stale {
                age: Duration::from_secs(61)
            }
        );
        assert_eq!(connects.load(Ordering::Relaxed), 0);
        assert!(sink.payloads().is_empty());
    }

    #[tokio::test]
    async fn test_stale_file_is_not_parsed() {
        let (_dir, path, modified) = stats_file("not json at all");
        let (client, _sink) = client();
        let forwarder = StatsForwarder::new(RadioConfig::new("myadsb"));

        let outcome = forwarder
            .forward_at(&path, modified + Duration::from_secs(120), |_| async {
                anyhow::Ok(client.clone())
            })
            .await
            .unwrap();
        assert!(matches!(outcome, ForwardOutcome::Stale { .. }));
    }

    #[tokio::test]
    async fn test_fresh_file_is_sent_in_batches() {
        let (_dir, path, modified) = stats_file(EXAMPLE_STATS);
        let (client, sink) = client();
        let forwarder = StatsForwarder::new(RadioConfig::new("myadsb"));

        let outcome = forwarder
            .forward_at(&path, modified + Duration::from_secs(30), |_| async {
                anyhow::Ok(client.clone())
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ForwardOutcome::Sent {
                age: Duration::from_secs(30),
                metrics: 29
            }
        );
        let payloads = sink.payloads();
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[0].lines().count(), 10);
        assert_eq!(payloads[2].lines().count(), 9);
    }

    #[tokio::test]
    async fn test_malformed_fresh_file_is_an_error() {
        let (_dir, path, modified) = stats_file(r#"{"last1min": {"messages": 12}}"#);
        let (client, sink) = client();
        let forwarder = StatsForwarder::new(RadioConfig::new("myadsb"));

        let result = forwarder
            .forward_at(&path, modified + Duration::from_secs(1), |_| async {
                anyhow::Ok(client.clone())
            })
            .await;
        assert!(result.is_err());
        assert!(sink.payloads().is_empty());
    }
}
