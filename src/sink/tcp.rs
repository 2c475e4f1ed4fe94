/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::io::{self, BufWriter, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Mutex;
use std::time::Duration;

use cadence::MetricSink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Newline delimited metric lines over a TCP stream. No reconnect: a broken
/// stream surfaces errors until the emitter is reconfigured.
pub(super) struct TcpMetricSink {
    stream: Mutex<BufWriter<TcpStream>>,
}

impl TcpMetricSink {
    pub(super) fn connect(addr: SocketAddr, buffer_size: usize) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(TcpMetricSink {
            stream: Mutex::new(BufWriter::with_capacity(buffer_size, stream)),
        })
    }
}

impl MetricSink for TcpMetricSink {
    fn emit(&self, metric: &str) -> io::Result<usize> {
        let mut stream = self.stream.lock().unwrap();
        stream.write_all(metric.as_bytes())?;
        stream.write_all(b"\n")?;
        Ok(metric.len() + 1)
    }

    fn flush(&self) -> io::Result<()> {
        self.stream.lock().unwrap().flush()
    }
}
