//! Send dump1090's one minute stats.json numbers to statsd.
//!
//! stats.json is only rewritten once a minute, so run this once a minute from
//! cron:
//!
//! ```text
//! */1 * * * * /usr/local/bin/dump1090-to-statsd myadsb 127.0.0.1 /run/dump1090-mutability/stats.json
//! ```

use anyhow::Result;
use clap::Parser;
use dump1090_statsd::logging::init_logging;
use dump1090_statsd::{ForwardOutcome, RadioConfig, StatsForwarder, WindowName, check_input_file};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Forward dump1090 stats.json decoder statistics to statsd")]
struct Args {
    /// statsd radio name prefix (metrics are named radios.<RADIO_NAME>.*)
    radio_name: String,
    /// statsd hostname
    statsd_host: String,
    /// Path to dump1090's stats.json
    stats_json: PathBuf,
    /// statsd UDP port
    #[arg(long, env = "STATSD_PORT", default_value_t = 8125)]
    statsd_port: u16,
    /// Ignore stats files older than this many seconds
    #[arg(long, default_value_t = 60)]
    max_age: u64,
    /// Aggregation window to forward
    #[arg(long, value_enum, default_value_t = WindowName::Last1Min)]
    window: WindowName,
}

fn parse_args() -> Args {
    Args::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = parse_args();
    init_logging();

    check_input_file(&args.stats_json)?;

    let config = RadioConfig::new(args.radio_name)
        .with_statsd_host(args.statsd_host)
        .with_statsd_port(args.statsd_port)
        .with_max_stats_age(Duration::from_secs(args.max_age));
    let forwarder = StatsForwarder::new(config).with_window(args.window);

    if let ForwardOutcome::Sent { metrics, .. } = forwarder.forward(&args.stats_json).await? {
        info!("Forwarded {} metrics", metrics);
    }
    Ok(())
}
