/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the silo-statsd authors
 */

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("collector server host is empty")]
    EmptyServer,
    #[error("invalid collector port: {0}")]
    InvalidPort(String),
    #[error("invalid max packet size: {0}")]
    InvalidPacketSize(String),
    #[error("invalid boolean value for key {0}: {1}")]
    InvalidBool(&'static str, String),
    #[error("unable to resolve collector address {0}:{1}")]
    UnresolvedAddress(String, u16),
    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),
    #[error("failed to create metrics sink: {0}")]
    Sink(#[source] io::Error),
    #[error("emitter has not been configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{failed} of {total} metrics failed to send: {last}")]
    Transport {
        failed: usize,
        total: usize,
        #[source]
        last: io::Error,
    },
}
