/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::io;

mod tcp;

mod statsd;
pub use statsd::StatsdSink;

/// The thin boundary the dispatcher writes metrics through. The production
/// implementation is [`StatsdSink`]; anything else can be installed with
/// `StatsdEmitter::apply_sink`.
pub trait CollectorSink {
    /// Set a gauge to an absolute reading.
    fn gauge_absolute(&self, name: &str, value: f64) -> io::Result<()>;

    /// Apply a signed delta to a running gauge.
    fn gauge_delta(&self, name: &str, value: f64) -> io::Result<()>;

    /// Record a raw string value into a set metric.
    fn set_raw(&self, name: &str, value: &str) -> io::Result<()>;

    /// Push out anything the sink has buffered.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

pub type DynCollectorSink = Box<dyn CollectorSink + Send + Sync>;
