/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

mod error;
pub use error::{ConfigError, ReportError};

mod config;
pub use config::EmitterConfig;

mod identity;
pub use identity::InstanceIdentity;

mod counter;
pub use counter::{
    CounterKind, CounterRecord, CounterStorage, CounterValue, NormalizedCounter, normalize,
};

mod snapshot;
pub use snapshot::{NodeRole, PerformanceSnapshot};

mod sink;
pub use sink::{CollectorSink, DynCollectorSink, StatsdSink};

mod telemetry;
pub use telemetry::{TelemetryProperties, TelemetryValue, TraceSeverity};

mod emitter;
pub use emitter::StatsdEmitter;
