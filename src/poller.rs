//! Periodic aircraft.json poller
//!
//! Every interval the poller reads the snapshot, compares its message counter
//! with the previous read, and submits the message delta plus the set of
//! aircraft heard in the last 10 seconds to statsd.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::RadioConfig;
use crate::metrics::PollerMetrics;
use crate::snapshot::{AircraftSnapshot, RecencyBuckets};
use crate::statsd::StatsdClient;

/// Number of set metrics flushed per pipeline
pub const AIRCRAFT_BATCH_SIZE: usize = 20;

/// Log a poller summary every this many cycles
const SUMMARY_EVERY_CYCLES: u64 = 6;

/// Baseline carried from one poll to the next
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PollState {
    /// Nothing has been read yet
    #[default]
    NoSample,
    Sample { timestamp: f64, messages: u64 },
}

impl PollState {
    pub fn from_snapshot(snapshot: &AircraftSnapshot) -> Self {
        PollState::Sample {
            timestamp: snapshot.now,
            messages: snapshot.messages,
        }
    }
}

/// Messages received over a positive interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Seconds between the two snapshots, always > 0
    pub elapsed: f64,
    pub messages: u64,
}

impl RateSample {
    pub fn per_second(&self) -> f64 {
        self.messages as f64 / self.elapsed
    }
}

/// What a snapshot means relative to the previous one
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    FirstPass,
    /// The message counter went backwards, dump1090 was restarted
    DecoderRestart { messages: u64 },
    /// The snapshot timestamp did not advance
    NoTimeElapsed,
    Rate(RateSample),
}

impl PollOutcome {
    pub fn observe(previous: PollState, snapshot: &AircraftSnapshot) -> Self {
        match previous {
            PollState::NoSample => PollOutcome::FirstPass,
            PollState::Sample { messages, .. } if snapshot.messages < messages => {
                PollOutcome::DecoderRestart {
                    messages: snapshot.messages,
                }
            }
            PollState::Sample {
                timestamp,
                messages,
            } => {
                let elapsed = snapshot.now - timestamp;
                if elapsed > 0.0 {
                    PollOutcome::Rate(RateSample {
                        elapsed,
                        messages: snapshot.messages - messages,
                    })
                } else {
                    PollOutcome::NoTimeElapsed
                }
            }
        }
    }

    pub fn rate(&self) -> Option<RateSample> {
        match self {
            PollOutcome::Rate(sample) => Some(*sample),
            _ => None,
        }
    }
}

/// Result of reading one snapshot
#[derive(Debug, Clone)]
pub struct Cycle {
    pub outcome: PollOutcome,
    /// Baseline for the next cycle, independent of emission
    pub next_state: PollState,
    pub buckets: RecencyBuckets,
}

/// Groups of aircraft hex codes sent per pipeline flush
pub fn aircraft_batches(buckets: &RecencyBuckets) -> std::slice::Chunks<'_, String> {
    buckets.within_10s.chunks(AIRCRAFT_BATCH_SIZE)
}

pub struct AircraftPoller {
    config: RadioConfig,
    path: PathBuf,
    client: StatsdClient,
    metrics: PollerMetrics,
}

impl AircraftPoller {
    pub fn new(config: RadioConfig, path: impl Into<PathBuf>, client: StatsdClient) -> Self {
        Self {
            config,
            path: path.into(),
            client,
            metrics: PollerMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &PollerMetrics {
        &self.metrics
    }

    /// Read the snapshot and classify it against `previous`
    pub fn read_cycle(&self, previous: PollState) -> Result<Cycle> {
        let snapshot = AircraftSnapshot::load(&self.path)?;
        let outcome = PollOutcome::observe(previous, &snapshot);

        match outcome {
            PollOutcome::FirstPass => info!("Starting up, first pass...."),
            PollOutcome::DecoderRestart { messages } => {
                PollerMetrics::add(&self.metrics.restarts_detected, 1);
                warn!(
                    "Looks like dump1090 restarted, message count reset ({})",
                    messages
                );
            }
            PollOutcome::NoTimeElapsed => {
                info!(
                    "Snapshot time has not advanced ({}), skipping rate",
                    snapshot.timestamp_display()
                );
            }
            PollOutcome::Rate(sample) => {
                PollerMetrics::add(&self.metrics.rates_computed, 1);
                PollerMetrics::add(&self.metrics.messages_counted, sample.messages);
                info!(
                    "{:.1} sec\t{} messages\t{:.1} messages per sec avg",
                    sample.elapsed,
                    sample.messages,
                    sample.per_second()
                );
            }
        }

        let buckets = snapshot.recency_buckets();
        let [s5, s10, s30, s60] = buckets.sizes();
        info!("\t5s:{}\t10s:{}\t30s:{}\t60s:{}", s5, s10, s30, s60);

        Ok(Cycle {
            outcome,
            next_state: PollState::from_snapshot(&snapshot),
            buckets,
        })
    }

    /// Submit the message delta and the recently heard aircraft.
    /// Returns the number of metrics sent.
    pub async fn emit(&self, rate: RateSample, buckets: &RecencyBuckets) -> Result<usize> {
        let delta = i64::try_from(rate.messages).unwrap_or(i64::MAX);
        self.client
            .incr(&self.config.metric_name("message_rate"), delta)
            .await?;
        let mut sent = 1;

        let aircraft_name = self.config.metric_name("aircraft");
        for batch in aircraft_batches(buckets) {
            let mut pipe = self.client.pipeline();
            for hex in batch {
                pipe.set(&aircraft_name, hex);
            }
            sent += pipe.send().await?;
        }

        PollerMetrics::add(&self.metrics.aircraft_reported, buckets.within_10s.len() as u64);
        debug!("Sent {} metrics to {}", sent, self.config.statsd_addr());
        Ok(sent)
    }

    /// Run one cycle and return the baseline for the next one.
    ///
    /// Snapshot errors are returned; emission errors are logged and do not
    /// affect the returned state.
    pub async fn poll_once(&self, previous: PollState) -> Result<PollState> {
        let cycle = self.read_cycle(previous)?;
        PollerMetrics::add(&self.metrics.cycles, 1);

        if let Some(rate) = cycle.outcome.rate() {
            let emission = tokio::time::timeout(
                self.config.poll_interval,
                self.emit(rate, &cycle.buckets),
            )
            .await
            .context("Timed out sending metrics")
            .and_then(|r| r);

            match emission {
                Ok(sent) => PollerMetrics::add(&self.metrics.metrics_emitted, sent as u64),
                Err(e) => {
                    PollerMetrics::add(&self.metrics.emit_failures, 1);
                    warn!("Failed to send metrics to statsd: {:#}", e);
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        if snapshot.cycles % SUMMARY_EVERY_CYCLES == 0 {
            info!("{}", snapshot.format_summary());
        }

        Ok(cycle.next_state)
    }

    /// Poll every configured interval until `shutdown` completes.
    ///
    /// Ticks missed while a cycle is still running are skipped, so cycles
    /// never overlap. A zero poll interval is rejected.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        anyhow::ensure!(
            !self.config.poll_interval.is_zero(),
            "Poll interval must be greater than zero"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "Polling {} every {}s for radio {}",
            self.path.display(),
            self.config.poll_interval.as_secs_f64(),
            self.config.radio_name
        );

        let mut state = PollState::NoSample;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping poller");
                    break;
                }
                _ = ticker.tick() => {
                    state = self.poll_once(state).await?;
                }
            }
        }

        info!("{}", self.metrics.snapshot().format_summary());
        Ok(())
    }
}

/// Wait for Ctrl+C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
