/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

/// Identity of the host runtime instance this emitter reports for.
///
/// The host populates this incrementally through its init hooks, in no
/// particular order. Any field may still be empty when the first metrics
/// are emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub deployment_id: String,
    pub instance_id: String,
    pub address: String,
    pub gateway_address: String,
    pub host_name: String,
    pub is_silo: bool,
}

impl Default for InstanceIdentity {
    fn default() -> Self {
        InstanceIdentity {
            deployment_id: String::new(),
            instance_id: String::new(),
            address: String::new(),
            gateway_address: String::new(),
            host_name: String::new(),
            is_silo: true,
        }
    }
}

impl InstanceIdentity {
    /// Merge in fields from a later init hook. Empty fields never overwrite
    /// values set by an earlier hook.
    pub fn merge(&mut self, update: InstanceIdentity) {
        if !update.deployment_id.is_empty() {
            self.deployment_id = update.deployment_id;
        }
        if !update.instance_id.is_empty() {
            self.instance_id = update.instance_id;
        }
        if !update.address.is_empty() {
            self.address = update.address;
        }
        if !update.gateway_address.is_empty() {
            self.gateway_address = update.gateway_address;
        }
        if !update.host_name.is_empty() {
            self.host_name = update.host_name;
        }
        self.is_silo = update.is_silo;
    }
}
