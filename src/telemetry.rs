/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::fmt;
use std::io;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::sink::CollectorSink;

pub(crate) const TELEMETRY_TYPE_METRIC: &str = "metric";
pub(crate) const TELEMETRY_TYPE_TRACE: &str = "trace";
pub(crate) const TELEMETRY_TYPE_EVENT: &str = "event";
pub(crate) const TELEMETRY_TYPE_EXCEPTION: &str = "exception";
pub(crate) const TELEMETRY_TYPE_DEPENDENCY: &str = "dependency";
pub(crate) const TELEMETRY_TYPE_REQUEST: &str = "request";
pub(crate) const TELEMETRY_TYPE_LOG: &str = "log";

/// Closed value type for telemetry properties.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    Str(String),
    Num(f64),
    Time(DateTime<Utc>),
    Bool(bool),
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Str(s) => f.write_str(s),
            TelemetryValue::Num(v) => write!(f, "{v}"),
            TelemetryValue::Time(t) => {
                f.write_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            TelemetryValue::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
        }
    }
}

impl From<&str> for TelemetryValue {
    fn from(v: &str) -> Self {
        TelemetryValue::Str(v.to_string())
    }
}

impl From<String> for TelemetryValue {
    fn from(v: String) -> Self {
        TelemetryValue::Str(v)
    }
}

impl From<f64> for TelemetryValue {
    fn from(v: f64) -> Self {
        TelemetryValue::Num(v)
    }
}

impl From<bool> for TelemetryValue {
    fn from(v: bool) -> Self {
        TelemetryValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for TelemetryValue {
    fn from(v: DateTime<Utc>) -> Self {
        TelemetryValue::Time(v)
    }
}

/// Ordered property bag, as accepted by the `track_*` entry points.
pub type TelemetryProperties = IndexMap<String, TelemetryValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceSeverity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl TraceSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceSeverity::Verbose => "verbose",
            TraceSeverity::Info => "info",
            TraceSeverity::Warning => "warning",
            TraceSeverity::Error => "error",
        }
    }
}

/// One telemetry item flattened to an ordered bag, emitted as one set value
/// per entry under `{kind}.{key}`.
pub(crate) struct TelemetryRecord {
    kind: &'static str,
    props: IndexMap<String, TelemetryValue>,
}

impl TelemetryRecord {
    pub(crate) fn new(kind: &'static str) -> Self {
        TelemetryRecord {
            kind,
            props: IndexMap::new(),
        }
    }

    pub(crate) fn push(&mut self, key: impl Into<String>, value: TelemetryValue) {
        self.props.insert(key.into(), value);
    }

    pub(crate) fn extend(
        &mut self,
        props: impl IntoIterator<Item = (String, TelemetryValue)>,
    ) {
        for (key, value) in props {
            self.props.insert(key, value);
        }
    }

    /// Append the standard trailer fields shared by every telemetry kind.
    pub(crate) fn stamp(&mut self, now: DateTime<Utc>, host_name: &str) {
        self.props
            .insert("utc_datetime".to_string(), TelemetryValue::Time(now));
        if !host_name.is_empty() {
            self.props
                .insert("host".to_string(), TelemetryValue::Str(host_name.to_string()));
        }
    }

    pub(crate) fn emit<S: CollectorSink + ?Sized>(
        &self,
        sink: &S,
    ) -> (usize, usize, Option<io::Error>) {
        let mut failed = 0;
        let mut last_error = None;
        for (key, value) in &self.props {
            let name = format!("{}.{}", self.kind, key);
            if let Err(e) = sink.set_raw(&name, &value.to_string()) {
                failed += 1;
                last_error = Some(e);
            }
        }
        (self.props.len(), failed, last_error)
    }
}
