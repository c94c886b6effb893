//! Probe module for upstream health checks.
//!
//! One probe is one bounded HTTP request against one registry target.

mod http;

pub use http::*;

use crate::registry::ProbeTarget;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("dns resolution failed: {0}")]
    Dns(String),
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error: HTTP {0}")]
    Server(u16),
}

impl ProbeError {
    /// Normalized error code reported in a [`ProbeResult`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Timeout(_) => ErrorKind::Timeout,
            ProbeError::Dns(_) => ErrorKind::DnsFailure,
            ProbeError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            ProbeError::Network(_) | ProbeError::Server(_) => ErrorKind::Other,
        }
    }
}

/// Normalized failure code of a probe that did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    DnsFailure,
    ConnectionRefused,
    Timeout,
    Other,
}

/// Outcome of one executed probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub target: ProbeTarget,
    /// True only for a 2xx response.
    pub succeeded: bool,
    /// 0 when no HTTP response was received.
    pub http_status: u16,
    pub latency_ms: Option<u64>,
    pub error_code: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub payload_size_bytes: usize,
}

impl ProbeResult {
    /// A response with status below 500 that was read to completion.
    pub fn completed(
        target: &ProbeTarget,
        http_status: u16,
        latency_ms: u64,
        payload: Option<serde_json::Value>,
        payload_size_bytes: usize,
    ) -> Self {
        Self {
            target: target.clone(),
            succeeded: (200..300).contains(&http_status),
            http_status,
            latency_ms: Some(latency_ms),
            error_code: None,
            error_message: None,
            payload,
            payload_size_bytes,
        }
    }

    /// A terminal failure: 5xx, network error or timeout.
    ///
    /// A server error keeps its status and latency; every other failure
    /// reports status 0 and no latency.
    pub fn failed(target: &ProbeTarget, error: ProbeError, latency_ms: Option<u64>) -> Self {
        let http_status = match error {
            ProbeError::Server(status) => status,
            _ => 0,
        };
        let latency_ms = match error {
            ProbeError::Server(_) => latency_ms,
            _ => None,
        };

        Self {
            target: target.clone(),
            succeeded: false,
            http_status,
            latency_ms,
            error_code: Some(error.kind()),
            error_message: Some(error.to_string()),
            payload: None,
            payload_size_bytes: 0,
        }
    }
}
