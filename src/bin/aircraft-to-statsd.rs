//! Send dump1090's aircraft.json data to statsd.
//!
//! aircraft.json holds the number of decoded messages along with information
//! about every aircraft dump1090 is able to hear. It is read every interval
//! and the message rate plus the aircraft heard in the last 10 seconds are
//! submitted to statsd.

use anyhow::Result;
use clap::Parser;
use dump1090_statsd::logging::init_logging;
use dump1090_statsd::poller::shutdown_signal;
use dump1090_statsd::{AircraftPoller, RadioConfig, StatsdClient, check_input_file};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Forward dump1090 aircraft.json message rates and aircraft to statsd")]
struct Args {
    /// Radio description for statsd (metrics are named radios.<RADIO_NAME>.*)
    radio_name: String,
    /// Path to dump1090's aircraft.json
    aircraft_json: PathBuf,
    /// statsd hostname
    #[arg(long, env = "STATSD_HOST", default_value = "127.0.0.1")]
    statsd_host: String,
    /// statsd UDP port
    #[arg(long, env = "STATSD_PORT", default_value_t = 8125)]
    statsd_port: u16,
    /// Seconds between aircraft.json reads
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
}

fn parse_args() -> Args {
    Args::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    init_logging();

    check_input_file(&args.aircraft_json)?;

    let config = RadioConfig::new(args.radio_name)
        .with_statsd_host(args.statsd_host)
        .with_statsd_port(args.statsd_port)
        .with_poll_interval(Duration::from_secs(args.interval));

    let client = StatsdClient::connect(&config.statsd_addr()).await?;
    info!("Sending aircraft metrics to statsd at {}", config.statsd_addr());

    let poller = AircraftPoller::new(config, args.aircraft_json, client);
    poller.run(shutdown_signal()).await
}
