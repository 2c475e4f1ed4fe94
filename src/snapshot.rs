/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

const METRIC_NAME_CPU_USAGE: &str = "cpu_usage";
const METRIC_NAME_TOTAL_PHYSICAL_MEMORY: &str = "total_physical_memory";
const METRIC_NAME_AVAILABLE_PHYSICAL_MEMORY: &str = "available_physical_memory";
const METRIC_NAME_MEMORY_USAGE: &str = "memory_usage";
const METRIC_NAME_SEND_QUEUE_LENGTH: &str = "send_queue_length";
const METRIC_NAME_RECEIVE_QUEUE_LENGTH: &str = "receive_queue_length";
const METRIC_NAME_SENT_MESSAGES: &str = "sent_messages";
const METRIC_NAME_RECEIVED_MESSAGES: &str = "received_messages";
const METRIC_NAME_ACTIVATION_COUNT: &str = "activation_count";
const METRIC_NAME_RECENTLY_USED_ACTIVATION_COUNT: &str = "recently_used_activation_count";
const METRIC_NAME_REQUEST_QUEUE_LENGTH: &str = "request_queue_length";
const METRIC_NAME_IS_OVERLOADED: &str = "is_overloaded";
const METRIC_NAME_CLIENT_COUNT: &str = "client_count";
const METRIC_NAME_CONNECTED_GATEWAY_COUNT: &str = "connected_gateway_count";

/// Role the reporting runtime instance plays, which selects the set of
/// role specific gauges emitted with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Silo,
    Client,
}

/// Point-in-time performance reading exported by the host each reporting
/// cycle. All gauges derived from it are absolute values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSnapshot {
    pub cpu_usage: f64,
    pub total_physical_memory: u64,
    pub available_physical_memory: u64,
    pub memory_usage: u64,
    pub send_queue_length: u64,
    pub receive_queue_length: u64,
    pub sent_messages: u64,
    pub received_messages: u64,
    pub activation_count: u64,
    pub recently_used_activation_count: u64,
    pub request_queue_length: u64,
    pub is_overloaded: bool,
    pub client_count: u64,
    pub connected_gateway_count: u64,
}

impl PerformanceSnapshot {
    /// The ordered gauge set for a role: the shared core gauges first, then
    /// the role specific ones.
    pub(crate) fn gauges(&self, role: NodeRole) -> Vec<(&'static str, f64)> {
        let mut gauges = Vec::with_capacity(13);
        gauges.push((METRIC_NAME_CPU_USAGE, self.cpu_usage));
        gauges.push((METRIC_NAME_TOTAL_PHYSICAL_MEMORY, self.total_physical_memory as f64));
        gauges.push((
            METRIC_NAME_AVAILABLE_PHYSICAL_MEMORY,
            self.available_physical_memory as f64,
        ));
        gauges.push((METRIC_NAME_MEMORY_USAGE, self.memory_usage as f64));
        gauges.push((METRIC_NAME_SEND_QUEUE_LENGTH, self.send_queue_length as f64));
        gauges.push((METRIC_NAME_RECEIVE_QUEUE_LENGTH, self.receive_queue_length as f64));
        gauges.push((METRIC_NAME_SENT_MESSAGES, self.sent_messages as f64));
        gauges.push((METRIC_NAME_RECEIVED_MESSAGES, self.received_messages as f64));

        match role {
            NodeRole::Silo => {
                gauges.push((METRIC_NAME_ACTIVATION_COUNT, self.activation_count as f64));
                gauges.push((
                    METRIC_NAME_RECENTLY_USED_ACTIVATION_COUNT,
                    self.recently_used_activation_count as f64,
                ));
                gauges.push((METRIC_NAME_REQUEST_QUEUE_LENGTH, self.request_queue_length as f64));
                gauges.push((
                    METRIC_NAME_IS_OVERLOADED,
                    if self.is_overloaded { 1.0 } else { 0.0 },
                ));
                gauges.push((METRIC_NAME_CLIENT_COUNT, self.client_count as f64));
            }
            NodeRole::Client => {
                gauges.push((
                    METRIC_NAME_CONNECTED_GATEWAY_COUNT,
                    self.connected_gateway_count as f64,
                ));
            }
        }
        gauges
    }
}
