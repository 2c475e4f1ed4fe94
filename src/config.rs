/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::identity::InstanceIdentity;

const KEY_SERVER_NAME: &str = "ServerName";
const KEY_SERVER_PORT: &str = "ServerPort";
const KEY_PREFIX: &str = "Prefix";
const KEY_MAX_UDP_PACKET_SIZE: &str = "MaxUdpPacketSize";
const KEY_USE_TCP_PROTOCOL: &str = "UseTcpProtocol";

pub const DEFAULT_SERVER: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8125;
pub const DEFAULT_MAX_PACKET_SIZE: usize = 512;

/// Fully resolved emission target. Immutable once resolved; a re-apply with
/// changed inputs produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    pub server: String,
    pub port: u16,
    pub prefix: String,
    pub max_packet_size: usize,
    pub use_tcp: bool,
}

impl EmitterConfig {
    /// Resolve an emission target from explicit settings plus the runtime
    /// supplied host and instance names.
    ///
    /// The prefix is derived from the inputs: with no configured prefix it is
    /// `lower(host_name).lower(instance_name)`, otherwise
    /// `lower(configured_prefix).lower(host_name)`.
    pub fn resolve(
        server: &str,
        port: u16,
        configured_prefix: &str,
        max_packet_size: usize,
        use_tcp: bool,
        host_name: &str,
        instance_name: &str,
    ) -> Result<Self, ConfigError> {
        if server.is_empty() {
            return Err(ConfigError::EmptyServer);
        }
        if port == 0 {
            return Err(ConfigError::InvalidPort(port.to_string()));
        }
        if max_packet_size == 0 {
            return Err(ConfigError::InvalidPacketSize(max_packet_size.to_string()));
        }

        let prefix = if configured_prefix.is_empty() {
            format!(
                "{}.{}",
                host_name.to_lowercase(),
                instance_name.to_lowercase()
            )
        } else {
            format!(
                "{}.{}",
                configured_prefix.to_lowercase(),
                host_name.to_lowercase()
            )
        };

        Ok(EmitterConfig {
            server: server.to_string(),
            port,
            prefix,
            max_packet_size,
            use_tcp,
        })
    }

    /// Resolve from the host's raw provider properties. Unset keys fall back
    /// to their defaults, malformed values are rejected.
    pub fn from_properties(
        props: &HashMap<String, String>,
        identity: &InstanceIdentity,
    ) -> Result<Self, ConfigError> {
        let server = props
            .get(KEY_SERVER_NAME)
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SERVER);

        let port = match props.get(KEY_SERVER_PORT) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| ConfigError::InvalidPort(v.clone()))?,
            None => DEFAULT_PORT,
        };

        let max_packet_size = match props.get(KEY_MAX_UDP_PACKET_SIZE) {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|s| *s != 0)
                .ok_or_else(|| ConfigError::InvalidPacketSize(v.clone()))?,
            None => DEFAULT_MAX_PACKET_SIZE,
        };

        let use_tcp = match props.get(KEY_USE_TCP_PROTOCOL) {
            Some(v) => parse_bool(v)
                .ok_or_else(|| ConfigError::InvalidBool(KEY_USE_TCP_PROTOCOL, v.clone()))?,
            None => false,
        };

        let configured_prefix = props.get(KEY_PREFIX).map(|s| s.as_str()).unwrap_or("");

        EmitterConfig::resolve(
            server,
            port,
            configured_prefix,
            max_packet_size,
            use_tcp,
            &identity.host_name,
            &identity.instance_id,
        )
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
