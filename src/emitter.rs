/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use log::trace;

use crate::config::EmitterConfig;
use crate::counter::{CounterKind, CounterRecord, normalize};
use crate::error::{ConfigError, ReportError};
use crate::identity::InstanceIdentity;
use crate::sink::{CollectorSink, DynCollectorSink, StatsdSink};
use crate::snapshot::{NodeRole, PerformanceSnapshot};
use crate::telemetry::{
    TELEMETRY_TYPE_DEPENDENCY, TELEMETRY_TYPE_EVENT, TELEMETRY_TYPE_EXCEPTION,
    TELEMETRY_TYPE_LOG, TELEMETRY_TYPE_METRIC, TELEMETRY_TYPE_REQUEST, TELEMETRY_TYPE_TRACE,
    TelemetryRecord, TelemetryValue, TraceSeverity,
};

/// StatsD emitter instance driven by the host runtime.
///
/// Starts unconfigured; `initialize` (or `apply`/`apply_sink`) installs the
/// emission target, after which the report entry points may be called from
/// any thread. Re-applying a configuration atomically replaces the previous
/// one. Emission before the first successful apply fails fast.
pub struct StatsdEmitter {
    identity: Mutex<InstanceIdentity>,
    sink: ArcSwapOption<DynCollectorSink>,
    config: ArcSwapOption<EmitterConfig>,
}

impl Default for StatsdEmitter {
    fn default() -> Self {
        StatsdEmitter::new()
    }
}

impl StatsdEmitter {
    pub fn new() -> Self {
        StatsdEmitter {
            identity: Mutex::new(InstanceIdentity::default()),
            sink: ArcSwapOption::empty(),
            config: ArcSwapOption::empty(),
        }
    }

    /// Host init hook: merge identity, resolve the emission target from the
    /// raw provider properties and apply it.
    pub fn initialize(
        &self,
        identity: InstanceIdentity,
        props: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        self.update_identity(identity);
        let config = {
            let identity = self.identity.lock().unwrap();
            EmitterConfig::from_properties(props, &identity)?
        };
        self.apply(config)
    }

    /// Incremental identity hook; may be called any number of times, in any
    /// order relative to the other init hooks.
    pub fn update_identity(&self, update: InstanceIdentity) {
        self.identity.lock().unwrap().merge(update);
    }

    pub fn identity(&self) -> InstanceIdentity {
        self.identity.lock().unwrap().clone()
    }

    /// Build the StatsD transport for a resolved configuration and install
    /// it. Safe to call repeatedly; later applies override earlier ones.
    pub fn apply(&self, config: EmitterConfig) -> Result<(), ConfigError> {
        let sink = StatsdSink::build(&config)?;
        self.install(Box::new(sink), config);
        Ok(())
    }

    /// Install a custom collector sink instead of the built-in StatsD one.
    pub fn apply_sink(&self, sink: DynCollectorSink, config: EmitterConfig) {
        self.install(sink, config);
    }

    fn install(&self, sink: DynCollectorSink, config: EmitterConfig) {
        self.config.store(Some(Arc::new(config)));
        self.sink.store(Some(Arc::new(sink)));
    }

    /// The currently applied configuration, if any.
    pub fn config(&self) -> Option<EmitterConfig> {
        self.config.load_full().map(|c| c.as_ref().clone())
    }

    pub fn is_configured(&self) -> bool {
        self.sink.load().is_some()
    }

    /// Flush and drop the emission target, returning to unconfigured.
    pub fn close(&self) {
        if let Some(sink) = self.sink.swap(None) {
            let _ = sink.flush();
        }
        self.config.store(None);
    }

    fn current_sink(&self) -> Result<Arc<DynCollectorSink>, ReportError> {
        self.sink
            .load_full()
            .ok_or(ReportError::Config(ConfigError::NotConfigured))
    }

    /// Forward a batch of counters: durable records only, normalized, deltas
    /// and absolute values dispatched in input order. One record's send
    /// failure does not stop the batch; an aggregate error is returned when
    /// at least one send failed.
    pub fn report_counters(&self, records: &[CounterRecord]) -> Result<(), ReportError> {
        let sink = self.current_sink()?;
        trace!("reporting {} counters", records.len());

        let mut total = 0usize;
        let mut failed = 0usize;
        let mut last_error = None;
        for record in records {
            if !record.storage.is_durable() {
                continue;
            }
            let Some(metric) = normalize(record) else {
                continue;
            };
            total += 1;
            let r = match metric.kind {
                CounterKind::Delta => sink.gauge_delta(&metric.name, metric.value),
                CounterKind::Absolute => sink.gauge_absolute(&metric.name, metric.value),
            };
            if let Err(e) = r {
                failed += 1;
                last_error = Some(e);
            }
        }

        finish_batch(&**sink, total, failed, last_error)
    }

    /// Emit the fixed gauge set for a performance snapshot: the shared core
    /// gauges plus the role specific ones.
    pub fn report_performance(
        &self,
        snapshot: &PerformanceSnapshot,
        role: NodeRole,
    ) -> Result<(), ReportError> {
        let sink = self.current_sink()?;
        trace!("reporting {role:?} performance snapshot");

        let gauges = snapshot.gauges(role);
        let total = gauges.len();
        let mut failed = 0usize;
        let mut last_error = None;
        for (name, value) in gauges {
            if let Err(e) = sink.gauge_absolute(name, value) {
                failed += 1;
                last_error = Some(e);
            }
        }

        finish_batch(&**sink, total, failed, last_error)
    }

    pub fn track_metric(
        &self,
        name: &str,
        value: f64,
        props: impl IntoIterator<Item = (String, TelemetryValue)>,
    ) -> Result<(), ReportError> {
        let mut record = TelemetryRecord::new(TELEMETRY_TYPE_METRIC);
        record.push(name, TelemetryValue::Num(value));
        record.extend(props);
        self.emit_telemetry(record)
    }

    pub fn increment_metric(&self, name: &str) -> Result<(), ReportError> {
        self.track_metric(name, 1.0, std::iter::empty())
    }

    pub fn decrement_metric(&self, name: &str) -> Result<(), ReportError> {
        self.track_metric(name, -1.0, std::iter::empty())
    }

    pub fn track_trace(
        &self,
        message: &str,
        severity: TraceSeverity,
        props: impl IntoIterator<Item = (String, TelemetryValue)>,
    ) -> Result<(), ReportError> {
        let mut record = TelemetryRecord::new(TELEMETRY_TYPE_TRACE);
        record.push("message", TelemetryValue::from(message));
        record.push("severity", TelemetryValue::from(severity.as_str()));
        record.extend(props);
        self.emit_telemetry(record)
    }

    pub fn track_event(
        &self,
        name: &str,
        props: impl IntoIterator<Item = (String, TelemetryValue)>,
    ) -> Result<(), ReportError> {
        let mut record = TelemetryRecord::new(TELEMETRY_TYPE_EVENT);
        record.push("event_name", TelemetryValue::from(name));
        record.extend(props);
        self.emit_telemetry(record)
    }

    pub fn track_exception(
        &self,
        error: &dyn std::error::Error,
        props: impl IntoIterator<Item = (String, TelemetryValue)>,
    ) -> Result<(), ReportError> {
        let mut record = TelemetryRecord::new(TELEMETRY_TYPE_EXCEPTION);
        record.push("exception", TelemetryValue::Str(format!("{error:?}")));
        record.push("message", TelemetryValue::Str(error.to_string()));
        record.extend(props);
        self.emit_telemetry(record)
    }

    pub fn track_dependency(
        &self,
        name: &str,
        command: &str,
        start_time: DateTime<Utc>,
        duration: Duration,
        success: bool,
    ) -> Result<(), ReportError> {
        let mut record = TelemetryRecord::new(TELEMETRY_TYPE_DEPENDENCY);
        record.push("dependency_name", TelemetryValue::from(name));
        record.push("command_name", TelemetryValue::from(command));
        record.push("start_time", TelemetryValue::Time(start_time));
        record.push(
            "duration",
            TelemetryValue::Num(duration.as_secs_f64() * 1000.0),
        );
        record.push("success", TelemetryValue::Bool(success));
        self.emit_telemetry(record)
    }

    pub fn track_request(
        &self,
        name: &str,
        start_time: DateTime<Utc>,
        duration: Duration,
        response_code: &str,
        success: bool,
    ) -> Result<(), ReportError> {
        let mut record = TelemetryRecord::new(TELEMETRY_TYPE_REQUEST);
        record.push("request", TelemetryValue::from(name));
        record.push("start_time", TelemetryValue::Time(start_time));
        record.push(
            "duration",
            TelemetryValue::Num(duration.as_secs_f64() * 1000.0),
        );
        record.push("response_code", TelemetryValue::from(response_code));
        record.push("success", TelemetryValue::Bool(success));
        self.emit_telemetry(record)
    }

    /// Forward a host log event. The optional endpoint and error fields are
    /// omitted from the bag when absent.
    #[allow(clippy::too_many_arguments)]
    pub fn track_log(
        &self,
        severity: TraceSeverity,
        logger_type: &str,
        caller: &str,
        message: &str,
        endpoint: Option<SocketAddr>,
        error: Option<&dyn std::error::Error>,
        event_code: i32,
    ) -> Result<(), ReportError> {
        let mut record = TelemetryRecord::new(TELEMETRY_TYPE_LOG);
        record.push("severity", TelemetryValue::from(severity.as_str()));
        record.push("logger_type", TelemetryValue::from(logger_type));
        record.push("caller", TelemetryValue::from(caller));
        record.push("message", TelemetryValue::from(message));
        if let Some(endpoint) = endpoint {
            record.push("endpoint", TelemetryValue::Str(endpoint.to_string()));
        }
        if let Some(error) = error {
            record.push("exception", TelemetryValue::Str(error.to_string()));
        }
        record.push("event_code", TelemetryValue::Num(event_code as f64));
        self.emit_telemetry(record)
    }

    fn emit_telemetry(&self, mut record: TelemetryRecord) -> Result<(), ReportError> {
        let sink = self.current_sink()?;
        let host_name = self.identity.lock().unwrap().host_name.clone();
        record.stamp(Utc::now(), &host_name);
        let (total, failed, last_error) = record.emit(&**sink);
        finish_batch(&**sink, total, failed, last_error)
    }
}

fn finish_batch<S: CollectorSink + ?Sized>(
    sink: &S,
    total: usize,
    failed: usize,
    last_error: Option<io::Error>,
) -> Result<(), ReportError> {
    let flush_error = sink.flush().err();
    match (failed, flush_error) {
        (0, None) => Ok(()),
        (f, None) => Err(ReportError::Transport {
            failed: f,
            total,
            last: last_error.unwrap_or_else(|| io::Error::other("metric send failed")),
        }),
        // a failed flush puts the whole buffered batch at risk
        (_, Some(e)) => Err(ReportError::Transport {
            failed: total,
            total,
            last: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CounterStorage;

    #[derive(Clone, Default)]
    struct RecordingSink {
        ops: Arc<Mutex<Vec<String>>>,
        fail_names: Vec<String>,
        fail_flush: bool,
    }

    impl RecordingSink {
        fn failing_on(names: &[&str]) -> Self {
            RecordingSink {
                fail_names: names.iter().map(|n| n.to_string()).collect(),
                ..Default::default()
            }
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn record(&self, op: String, name: &str) -> io::Result<()> {
            if self.fail_names.iter().any(|n| n == name) {
                return Err(io::Error::other("send failed"));
            }
            self.ops.lock().unwrap().push(op);
            Ok(())
        }
    }

    impl CollectorSink for RecordingSink {
        fn gauge_absolute(&self, name: &str, value: f64) -> io::Result<()> {
            self.record(format!("abs {name} {value}"), name)
        }

        fn gauge_delta(&self, name: &str, value: f64) -> io::Result<()> {
            self.record(format!("delta {name} {value}"), name)
        }

        fn set_raw(&self, name: &str, value: &str) -> io::Result<()> {
            self.record(format!("set {name} {value}"), name)
        }

        fn flush(&self) -> io::Result<()> {
            if self.fail_flush {
                return Err(io::Error::other("flush failed"));
            }
            self.ops.lock().unwrap().push("flush".to_string());
            Ok(())
        }
    }

    fn test_config() -> EmitterConfig {
        EmitterConfig::resolve("statsd.local", 8125, "", 512, false, "Host", "Silo").unwrap()
    }

    fn emitter_with_sink(sink: RecordingSink) -> StatsdEmitter {
        let emitter = StatsdEmitter::new();
        emitter.apply_sink(Box::new(sink), test_config());
        emitter
    }

    #[test]
    fn unconfigured_fails_fast() {
        let emitter = StatsdEmitter::new();
        assert!(matches!(
            emitter.report_counters(&[]),
            Err(ReportError::Config(ConfigError::NotConfigured))
        ));
        assert!(matches!(
            emitter.report_performance(&PerformanceSnapshot::default(), NodeRole::Silo),
            Err(ReportError::Config(ConfigError::NotConfigured))
        ));
        assert!(matches!(
            emitter.increment_metric("requests"),
            Err(ReportError::Config(ConfigError::NotConfigured))
        ));
    }

    #[test]
    fn counters_dispatch_by_kind() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        let records = vec![
            CounterRecord::delta("Requests", CounterStorage::Durable, "3.5"),
            CounterRecord::absolute("Queue.Size", CounterStorage::Durable, "12"),
        ];
        emitter.report_counters(&records).unwrap();

        assert_eq!(
            sink.ops(),
            ["delta requests 3.5", "abs queue.size 12", "flush"]
        );
    }

    #[test]
    fn counters_skip_non_durable_and_unparsable() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        let records = vec![
            CounterRecord::delta("Dropped", CounterStorage::Transient, "1"),
            CounterRecord::delta("AlsoDropped", CounterStorage::Log, "2"),
            CounterRecord::absolute("Textual", CounterStorage::Durable, "N/A"),
            CounterRecord::absolute("Kept", CounterStorage::Durable, "7"),
        ];
        emitter.report_counters(&records).unwrap();

        assert_eq!(sink.ops(), ["abs kept 7", "flush"]);
    }

    #[test]
    fn counters_continue_past_send_failure() {
        let sink = RecordingSink::failing_on(&["bad"]);
        let emitter = emitter_with_sink(sink.clone());

        let records = vec![
            CounterRecord::absolute("First", CounterStorage::Durable, "1"),
            CounterRecord::absolute("Bad", CounterStorage::Durable, "2"),
            CounterRecord::absolute("Last", CounterStorage::Durable, "3"),
        ];
        let err = emitter.report_counters(&records).unwrap_err();

        assert_eq!(sink.ops(), ["abs first 1", "abs last 3", "flush"]);
        match err {
            ReportError::Transport { failed, total, .. } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn flush_failure_fails_the_call() {
        let sink = RecordingSink {
            fail_flush: true,
            ..Default::default()
        };
        let emitter = emitter_with_sink(sink.clone());

        let records = vec![CounterRecord::absolute("A", CounterStorage::Durable, "1")];
        let err = emitter.report_counters(&records).unwrap_err();
        match err {
            ReportError::Transport { failed, total, .. } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn silo_snapshot_gauges() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        let snapshot = PerformanceSnapshot {
            cpu_usage: 0.5,
            is_overloaded: true,
            activation_count: 250,
            ..Default::default()
        };
        emitter
            .report_performance(&snapshot, NodeRole::Silo)
            .unwrap();

        let ops = sink.ops();
        assert_eq!(ops.len(), 14); // 8 core + 5 silo + flush
        assert_eq!(ops[0], "abs cpu_usage 0.5");
        assert!(ops.contains(&"abs activation_count 250".to_string()));
        assert!(ops.contains(&"abs is_overloaded 1".to_string()));
        assert_eq!(ops.last().unwrap(), "flush");
    }

    #[test]
    fn client_snapshot_gauges() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        let snapshot = PerformanceSnapshot {
            connected_gateway_count: 2,
            ..Default::default()
        };
        emitter
            .report_performance(&snapshot, NodeRole::Client)
            .unwrap();

        let ops = sink.ops();
        assert_eq!(ops.len(), 10); // 8 core + 1 client + flush
        assert!(ops.contains(&"abs connected_gateway_count 2".to_string()));
        assert!(!ops.iter().any(|op| op.contains("activation_count")));
    }

    #[test]
    fn telemetry_trace_layout() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());
        emitter.update_identity(InstanceIdentity {
            host_name: "Host-A".to_string(),
            ..Default::default()
        });

        emitter
            .track_trace(
                "slow request",
                TraceSeverity::Warning,
                [("region".to_string(), TelemetryValue::from("eu-1"))],
            )
            .unwrap();

        let ops = sink.ops();
        assert_eq!(ops[0], "set trace.message slow request");
        assert_eq!(ops[1], "set trace.severity warning");
        assert_eq!(ops[2], "set trace.region eu-1");
        assert!(ops[3].starts_with("set trace.utc_datetime "));
        assert_eq!(ops[4], "set trace.host Host-A");
        assert_eq!(ops[5], "flush");
    }

    #[test]
    fn telemetry_metric_shorthands() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        emitter.increment_metric("connects").unwrap();
        emitter.decrement_metric("connects").unwrap();

        let ops = sink.ops();
        assert_eq!(ops[0], "set metric.connects 1");
        assert_eq!(ops[2], "flush");
        assert_eq!(ops[3], "set metric.connects -1");
    }

    #[test]
    fn telemetry_request_layout() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        emitter
            .track_request(
                "GetAccount",
                Utc::now(),
                Duration::from_millis(250),
                "200",
                true,
            )
            .unwrap();

        let ops = sink.ops();
        assert_eq!(ops[0], "set request.request GetAccount");
        assert!(ops[1].starts_with("set request.start_time "));
        assert_eq!(ops[2], "set request.duration 250");
        assert_eq!(ops[3], "set request.response_code 200");
        assert_eq!(ops[4], "set request.success true");
    }

    #[test]
    fn telemetry_log_layout() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        let error = io::Error::other("gateway unreachable");
        emitter
            .track_log(
                TraceSeverity::Error,
                "Runtime.Messaging",
                "GatewayConnection",
                "connection lost",
                Some(SocketAddr::from(([10, 0, 0, 7], 30000))),
                Some(&error),
                100_101,
            )
            .unwrap();

        let ops = sink.ops();
        assert_eq!(ops[0], "set log.severity error");
        assert_eq!(ops[1], "set log.logger_type Runtime.Messaging");
        assert_eq!(ops[2], "set log.caller GatewayConnection");
        assert_eq!(ops[3], "set log.message connection lost");
        assert_eq!(ops[4], "set log.endpoint 10.0.0.7:30000");
        assert_eq!(ops[5], "set log.exception gateway unreachable");
        assert_eq!(ops[6], "set log.event_code 100101");
        assert!(ops[7].starts_with("set log.utc_datetime "));
        assert_eq!(ops[8], "flush");
    }

    #[test]
    fn log_without_optional_fields() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());

        emitter
            .track_log(TraceSeverity::Info, "Silo", "Startup", "silo started", None, None, 0)
            .unwrap();

        let ops = sink.ops();
        assert_eq!(ops[0], "set log.severity info");
        assert_eq!(ops[3], "set log.message silo started");
        assert_eq!(ops[4], "set log.event_code 0");
        assert!(!ops.iter().any(|op| op.starts_with("set log.endpoint")));
        assert!(!ops.iter().any(|op| op.starts_with("set log.exception")));
    }

    #[test]
    fn apply_sink_is_idempotent() {
        let emitter = StatsdEmitter::new();
        emitter.apply_sink(Box::new(RecordingSink::default()), test_config());
        let first = emitter.config().unwrap();
        emitter.apply_sink(Box::new(RecordingSink::default()), test_config());
        let second = emitter.config().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn close_returns_to_unconfigured() {
        let sink = RecordingSink::default();
        let emitter = emitter_with_sink(sink.clone());
        assert!(emitter.is_configured());

        emitter.close();
        assert!(!emitter.is_configured());
        assert_eq!(sink.ops(), ["flush"]);
        assert!(emitter.config().is_none());
        assert!(matches!(
            emitter.report_counters(&[]),
            Err(ReportError::Config(ConfigError::NotConfigured))
        ));

        // reconfiguration after close is allowed
        emitter.apply_sink(Box::new(RecordingSink::default()), test_config());
        assert!(emitter.is_configured());
    }
}
