//! Minimal statsd client
//!
//! Metrics are encoded in the plain statsd line protocol and sent over UDP
//! without acknowledgement:
//!
//! ```text
//! radios.myadsb.message_rate:1520|c
//! radios.myadsb.cpr.global_ok:431|g
//! radios.myadsb.cpu.demodulation:5240|ms
//! radios.myadsb.aircraft:a66c99|s
//! ```
//!
//! A [`Pipeline`] buffers metrics and packs them into newline separated
//! datagrams when [`Pipeline::send`] is called.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::debug;

/// Largest datagram payload built by a pipeline
pub const MAX_PACKET_SIZE: usize = 512;

/// A single statsd submission
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    /// Accumulating delta (`|c`)
    Counter { name: String, value: i64 },
    /// Instantaneous value (`|g`)
    Gauge { name: String, value: f64 },
    /// Duration sample in milliseconds (`|ms`)
    Timing { name: String, value: f64 },
    /// Distinct member of a set (`|s`)
    Set { name: String, member: String },
}

impl Metric {
    pub fn counter(name: impl Into<String>, value: i64) -> Self {
        Metric::Counter {
            name: name.into(),
            value,
        }
    }

    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Metric::Gauge {
            name: name.into(),
            value,
        }
    }

    pub fn timing(name: impl Into<String>, value: f64) -> Self {
        Metric::Timing {
            name: name.into(),
            value,
        }
    }

    pub fn set(name: impl Into<String>, member: impl Into<String>) -> Self {
        Metric::Set {
            name: name.into(),
            member: member.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Metric::Counter { name, .. }
            | Metric::Gauge { name, .. }
            | Metric::Timing { name, .. }
            | Metric::Set { name, .. } => name,
        }
    }

    /// Encode the metric as a single statsd line (without trailing newline)
    pub fn encode(&self) -> String {
        match self {
            Metric::Counter { name, value } => format!("{}:{}|c", name, value),
            Metric::Gauge { name, value } => format!("{}:{}|g", name, value),
            Metric::Timing { name, value } => format!("{}:{}|ms", name, value),
            Metric::Set { name, member } => format!("{}:{}|s", name, member),
        }
    }
}

/// Transport for encoded statsd payloads
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Send one datagram payload. Delivery is not acknowledged.
    async fn send(&self, payload: &str) -> Result<()>;
}

/// UDP transport connected to a statsd daemon
pub struct UdpSink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpSink {
    /// Resolve `addr` (`host:port`) and connect a local UDP socket to it
    pub async fn connect(addr: &str) -> Result<Self> {
        let peer = tokio::net::lookup_host(addr)
            .await
            .with_context(|| format!("Failed to resolve statsd address {}", addr))?
            .next()
            .with_context(|| format!("No addresses found for statsd host {}", addr))?;

        let local = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)
            .await
            .context("Failed to bind local UDP socket")?;
        socket
            .connect(peer)
            .await
            .with_context(|| format!("Failed to connect UDP socket to {}", peer))?;

        debug!("statsd UDP sink connected to {}", peer);
        Ok(Self { socket, peer })
    }
}

#[async_trait]
impl MetricSink for UdpSink {
    async fn send(&self, payload: &str) -> Result<()> {
        self.socket
            .send(payload.as_bytes())
            .await
            .with_context(|| format!("Failed to send statsd datagram to {}", self.peer))?;
        Ok(())
    }
}

/// statsd client submitting metrics through a [`MetricSink`]
#[derive(Clone)]
pub struct StatsdClient {
    sink: Arc<dyn MetricSink>,
}

impl StatsdClient {
    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self { sink }
    }

    /// Connect a client to a statsd daemon over UDP
    pub async fn connect(addr: &str) -> Result<Self> {
        let sink = UdpSink::connect(addr).await?;
        Ok(Self::new(Arc::new(sink)))
    }

    /// Send a single metric immediately
    pub async fn submit(&self, metric: &Metric) -> Result<()> {
        self.sink.send(&metric.encode()).await
    }

    pub async fn incr(&self, name: &str, value: i64) -> Result<()> {
        self.submit(&Metric::counter(name, value)).await
    }

    pub async fn gauge(&self, name: &str, value: f64) -> Result<()> {
        self.submit(&Metric::gauge(name, value)).await
    }

    pub async fn timing(&self, name: &str, value: f64) -> Result<()> {
        self.submit(&Metric::timing(name, value)).await
    }

    pub async fn set(&self, name: &str, member: &str) -> Result<()> {
        self.submit(&Metric::set(name, member)).await
    }

    /// Start a pipeline that batches metrics until it is sent
    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            client: self,
            metrics: Vec::new(),
        }
    }
}

/// Buffered batch of metrics sharing a flush
pub struct Pipeline<'a> {
    client: &'a StatsdClient,
    metrics: Vec<Metric>,
}

impl Pipeline<'_> {
    pub fn push(&mut self, metric: Metric) -> &mut Self {
        self.metrics.push(metric);
        self
    }

    pub fn gauge(&mut self, name: &str, value: f64) -> &mut Self {
        self.push(Metric::gauge(name, value))
    }

    pub fn timing(&mut self, name: &str, value: f64) -> &mut Self {
        self.push(Metric::timing(name, value))
    }

    pub fn set(&mut self, name: &str, member: &str) -> &mut Self {
        self.push(Metric::set(name, member))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Flush all buffered metrics. Returns the number of metrics sent.
    ///
    /// Lines are packed into datagrams of at most [`MAX_PACKET_SIZE`] bytes;
    /// a single line longer than that is sent on its own.
    pub async fn send(&mut self) -> Result<usize> {
        let count = self.metrics.len();
        for payload in pack_lines(self.metrics.drain(..).map(|m| m.encode())) {
            self.client.sink.send(&payload).await?;
        }
        Ok(count)
    }
}

fn pack_lines(lines: impl Iterator<Item = String>) -> Vec<String> {
    let mut packets = Vec::new();
    let mut current = String::new();

    for line in lines {
        if !current.is_empty() && current.len() + 1 + line.len() > MAX_PACKET_SIZE {
            packets.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }

    if !current.is_empty() {
        packets.push(current);
    }
    packets
}

/// Sink that records payloads in memory
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemorySink {
    payloads: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemorySink {
    pub(crate) fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    /// All recorded lines, in submission order
    pub(crate) fn lines(&self) -> Vec<String> {
        self.payloads()
            .iter()
            .flat_map(|p| p.split('\n').map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl MetricSink for MemorySink {
    async fn send(&self, payload: &str) -> Result<()> {
        self.payloads.lock().unwrap().push(payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_encoding() {
        assert_eq!(
            Metric::counter("radios.myadsb.message_rate", 1520).encode(),
            "radios.myadsb.message_rate:1520|c"
        );
        assert_eq!(Metric::gauge("radios.myadsb.bad", 0.0).encode(), "radios.myadsb.bad:0|g");
        assert_eq!(
            Metric::timing("radios.myadsb.cpu.usb", 12.5).encode(),
            "radios.myadsb.cpu.usb:12.5|ms"
        );
        assert_eq!(
            Metric::set("radios.myadsb.aircraft", "a66c99").encode(),
            "radios.myadsb.aircraft:a66c99|s"
        );
    }

    #[test]
    fn test_integral_gauge_has_no_fraction() {
        assert_eq!(Metric::gauge("g", 36354113.0).encode(), "g:36354113|g");
    }

    #[test]
    fn test_pack_lines_respects_packet_size() {
        let lines: Vec<String> = (0..60).map(|i| format!("radios.test.aircraft:{:06x}|s", i)).collect();
        let packets = pack_lines(lines.clone().into_iter());

        assert!(packets.len() > 1);
        assert!(packets.iter().all(|p| p.len() <= MAX_PACKET_SIZE));

        let rejoined: Vec<String> = packets
            .iter()
            .flat_map(|p| p.split('\n').map(str::to_string).collect::<Vec<_>>())
            .collect();
        assert_eq!(rejoined, lines);
    }

    #[tokio::test]
    async fn test_empty_pipeline_sends_nothing() {
        let sink = Arc::new(MemorySink::default());
        let client = StatsdClient::new(sink.clone());

        let sent = client.pipeline().send().await.unwrap();
        assert_eq!(sent, 0);
        assert!(sink.payloads().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_batches_into_one_datagram() {
        let sink = Arc::new(MemorySink::default());
        let client = StatsdClient::new(sink.clone());

        let mut pipe = client.pipeline();
        pipe.gauge("a", 1.0).gauge("b", 2.0).timing("c", 3.0);
        assert_eq!(pipe.len(), 3);

        assert_eq!(pipe.send().await.unwrap(), 3);
        assert!(pipe.is_empty());
        assert_eq!(sink.payloads(), vec!["a:1|g\nb:2|g\nc:3|ms".to_string()]);
    }

    #[tokio::test]
    async fn test_udp_sink_delivers_datagram() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let client = StatsdClient::connect(&addr).await.unwrap();
        client.incr("radios.test.message_rate", 42).await.unwrap();

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let len = server.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"radios.test.message_rate:42|c");
    }
}
