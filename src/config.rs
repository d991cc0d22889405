use std::time::Duration;

/// Default statsd UDP port
pub const DEFAULT_STATSD_PORT: u16 = 8125;

/// Default statsd host
pub const DEFAULT_STATSD_HOST: &str = "127.0.0.1";

/// Seconds between aircraft.json polls. 10 seconds works nicely with dump1090.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// stats.json files older than this are not forwarded
pub const DEFAULT_MAX_STATS_AGE: Duration = Duration::from_secs(60);

/// Configuration shared by the poller and the forwarder.
///
/// Built once at startup from the command line and handed to every component
/// by reference.
#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// Radio description used in metric names (`radios.<radio_name>.*`)
    pub radio_name: String,
    /// Hostname of the statsd daemon
    pub statsd_host: String,
    /// UDP port of the statsd daemon
    pub statsd_port: u16,
    /// Interval between aircraft.json polls
    pub poll_interval: Duration,
    /// Maximum age of a stats.json file that is still forwarded
    pub max_stats_age: Duration,
}

impl RadioConfig {
    pub fn new(radio_name: impl Into<String>) -> Self {
        Self {
            radio_name: radio_name.into(),
            statsd_host: DEFAULT_STATSD_HOST.to_string(),
            statsd_port: DEFAULT_STATSD_PORT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_stats_age: DEFAULT_MAX_STATS_AGE,
        }
    }

    pub fn with_statsd_host(mut self, host: impl Into<String>) -> Self {
        self.statsd_host = host.into();
        self
    }

    pub fn with_statsd_port(mut self, port: u16) -> Self {
        self.statsd_port = port;
        self
    }

    /// Must be non-zero, [`crate::AircraftPoller::run`] fails otherwise
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_stats_age(mut self, age: Duration) -> Self {
        self.max_stats_age = age;
        self
    }

    /// Prefix shared by every metric of this radio
    pub fn metric_prefix(&self) -> String {
        format!("radios.{}", self.radio_name)
    }

    /// Fully qualified metric name, e.g. `radios.myadsb.cpr.global_ok`
    pub fn metric_name(&self, suffix: &str) -> String {
        format!("{}.{}", self.metric_prefix(), suffix)
    }

    /// `host:port` address of the statsd daemon
    pub fn statsd_addr(&self) -> String {
        format!("{}:{}", self.statsd_host, self.statsd_port)
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_config_defaults() {
        let config = RadioConfig::new("myadsb");
        assert_eq!(config.statsd_host, "127.0.0.1");
        assert_eq!(config.statsd_port, 8125);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_stats_age, Duration::from_secs(60));
    }

    #[test]
    fn test_metric_names() {
        let config = RadioConfig::new("myadsb");
        assert_eq!(config.metric_name("cpr.global_ok"), "radios.myadsb.cpr.global_ok");
        assert_eq!(config.metric_name("aircraft"), "radios.myadsb.aircraft");
        assert_eq!(config.metric_name("message_rate"), "radios.myadsb.message_rate");
    }

    #[test]
    fn test_builder_overrides() {
        let config = RadioConfig::new("roof")
            .with_statsd_host("graphite.lan")
            .with_statsd_port(9125)
            .with_poll_interval(Duration::from_secs(5));

        assert_eq!(config.statsd_addr(), "graphite.lan:9125");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
