/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::panic::RefUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cadence::{BufferedUdpMetricSink, Gauged, MetricSink, StatsdClient};
use log::warn;

use crate::config::EmitterConfig;
use crate::error::ConfigError;

use super::CollectorSink;
use super::tcp::TcpMetricSink;

const UDP_SEND_TIMEOUT: Duration = Duration::from_millis(500);

type ArcMetricSink = Arc<dyn MetricSink + Send + Sync + RefUnwindSafe>;

/// Shared transport handle, so raw lines travel through the same buffered
/// sink as the metrics formatted by the client.
#[derive(Clone)]
struct SinkHandle(ArcMetricSink);

impl MetricSink for SinkHandle {
    fn emit(&self, metric: &str) -> io::Result<usize> {
        self.0.emit(metric)
    }

    fn flush(&self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Production collector sink over a StatsD transport.
///
/// Absolute gauges go through the wrapped [`StatsdClient`]; signed gauge
/// deltas and string set values are line forms the client does not offer, so
/// they are written through the shared sink handle directly.
pub struct StatsdSink {
    client: StatsdClient,
    sink: SinkHandle,
    prefix: String,
    create_instant: Instant,
    last_error_report: AtomicU64,
}

impl StatsdSink {
    pub fn build(config: &EmitterConfig) -> Result<Self, ConfigError> {
        let addr = resolve_collector_addr(&config.server, config.port)?;

        let sink: ArcMetricSink = if config.use_tcp {
            let sink = TcpMetricSink::connect(addr, config.max_packet_size)
                .map_err(ConfigError::Socket)?;
            Arc::new(sink)
        } else {
            let bind = match addr {
                SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            };
            let socket =
                UdpSocket::bind(SocketAddr::new(bind, 0)).map_err(ConfigError::Socket)?;
            socket
                .set_write_timeout(Some(UDP_SEND_TIMEOUT))
                .map_err(ConfigError::Socket)?;
            let sink = BufferedUdpMetricSink::with_capacity(addr, socket, config.max_packet_size)
                .map_err(|e| ConfigError::Sink(io::Error::other(e)))?;
            Arc::new(sink)
        };

        Ok(StatsdSink::with_metric_sink(&config.prefix, SinkHandle(sink)))
    }

    fn with_metric_sink(prefix: &str, handle: SinkHandle) -> Self {
        StatsdSink {
            client: StatsdClient::from_sink(prefix, handle.clone()),
            sink: handle,
            prefix: prefix.to_string(),
            create_instant: Instant::now(),
            last_error_report: AtomicU64::new(u64::MAX),
        }
    }

    fn emit_raw(&self, line: &str) -> io::Result<()> {
        match self.sink.emit(line) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.note_send_error(&e);
                Err(e)
            }
        }
    }

    fn note_send_error(&self, e: &io::Error) {
        let time_slice = self.create_instant.elapsed().as_secs().rotate_right(6); // every 64s
        if self.last_error_report.swap(time_slice, Ordering::Relaxed) != time_slice {
            warn!("sending metrics error: {e:?}");
        }
    }

    fn push_metric_head(&self, line: &mut String, name: &str) {
        if !self.prefix.is_empty() {
            line.push_str(&self.prefix);
            line.push('.');
        }
        push_sanitized(line, name);
        line.push(':');
    }
}

impl CollectorSink for StatsdSink {
    fn gauge_absolute(&self, name: &str, value: f64) -> io::Result<()> {
        match self.client.gauge(name, value) {
            Ok(_) => Ok(()),
            Err(e) => {
                let e = io::Error::other(e);
                self.note_send_error(&e);
                Err(e)
            }
        }
    }

    fn gauge_delta(&self, name: &str, value: f64) -> io::Result<()> {
        let mut line = String::with_capacity(self.prefix.len() + name.len() + 24);
        self.push_metric_head(&mut line, name);
        if value.is_sign_positive() {
            line.push('+');
        }
        let mut buffer = ryu::Buffer::new();
        line.push_str(buffer.format(value));
        line.push_str("|g");
        self.emit_raw(&line)
    }

    fn set_raw(&self, name: &str, value: &str) -> io::Result<()> {
        let mut line =
            String::with_capacity(self.prefix.len() + name.len() + value.len() + 8);
        self.push_metric_head(&mut line, name);
        push_sanitized(&mut line, value);
        line.push_str("|s");
        self.emit_raw(&line)
    }

    fn flush(&self) -> io::Result<()> {
        self.sink.flush().inspect_err(|e| self.note_send_error(e))
    }
}

fn resolve_collector_addr(server: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    (server, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::UnresolvedAddress(server.to_string(), port))
}

/// Replace bytes that would break the line protocol.
fn push_sanitized(line: &mut String, part: &str) {
    for c in part.chars() {
        match c {
            ':' | '|' | '\n' => line.push('_'),
            _ => line.push(c),
        }
    }
}
