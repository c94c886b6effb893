//! Response classification.
//!
//! Maps a raw [`ProbeResult`] to a [`HealthVerdict`]. Classification is pure:
//! no I/O and no shared state.

mod heuristics;

pub use heuristics::*;

use crate::probe::{ErrorKind, ProbeResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-service health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Operational,
    Degraded,
    Failed,
    NeedsAuth,
}

/// Severity bucket of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthLevel {
    Healthy,
    Partial,
    Unhealthy,
}

/// Classified outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthVerdict {
    pub status: HealthStatus,
    pub health_level: HealthLevel,
    pub message: String,
    pub detail: Option<String>,
}

impl HealthVerdict {
    pub fn new(status: HealthStatus, health_level: HealthLevel, message: impl Into<String>) -> Self {
        Self {
            status,
            health_level,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }

    fn operational(message: &str) -> Self {
        Self::new(HealthStatus::Operational, HealthLevel::Healthy, message)
    }

    fn degraded(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded, HealthLevel::Partial, message)
    }

    fn failed(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Failed, HealthLevel::Unhealthy, message)
    }
}

/// Classifier holding the heuristic registry.
#[derive(Debug, Clone)]
pub struct Classifier {
    heuristics: Heuristics,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Heuristics::builtin())
    }
}

impl Classifier {
    pub fn new(heuristics: Heuristics) -> Self {
        Self { heuristics }
    }

    /// Classify a probe result using the heuristic registered for `service_key`.
    pub fn classify(&self, service_key: &str, result: &ProbeResult) -> HealthVerdict {
        if !result.succeeded {
            return classify_failure(result);
        }

        let payload = match &result.payload {
            Some(p) if !is_empty_payload(p) => p,
            _ => return HealthVerdict::degraded("empty response"),
        };

        let shape = self
            .heuristics
            .get(service_key)
            .map(|heuristic| heuristic(payload))
            .unwrap_or(Shape::Unrecognized);

        match shape {
            Shape::Recognized { detail } => {
                HealthVerdict::operational("service operational").with_detail(detail)
            }
            Shape::ReportedError { severity: Severity::Degraded, message } => {
                HealthVerdict::degraded("service reported an error").with_detail(Some(message))
            }
            Shape::ReportedError { severity: Severity::Failed, message } => {
                HealthVerdict::failed("service reported an error").with_detail(Some(message))
            }
            Shape::Unrecognized => HealthVerdict::degraded("unrecognized response format"),
        }
    }
}

fn classify_failure(result: &ProbeResult) -> HealthVerdict {
    let detail = result
        .payload
        .as_ref()
        .and_then(error_text)
        .or_else(|| result.error_message.clone());
    let requires_auth = result.target.requires_auth;

    let verdict = match result.http_status {
        401 if requires_auth => HealthVerdict::new(
            HealthStatus::NeedsAuth,
            HealthLevel::Healthy,
            "authentication required",
        ),
        403 if requires_auth => HealthVerdict::new(
            HealthStatus::NeedsAuth,
            HealthLevel::Healthy,
            "access forbidden",
        ),
        401 => HealthVerdict::failed("unexpected authentication challenge"),
        403 => HealthVerdict::failed("access forbidden"),
        404 => HealthVerdict::failed("endpoint not found"),
        429 => HealthVerdict::degraded("rate limit exceeded"),
        status @ (100..=199 | 300..=499) => HealthVerdict::failed(format!("HTTP {}", status)),
        status @ 500..=u16::MAX => HealthVerdict::failed(format!("server error (HTTP {})", status)),
        _ => match result.error_code {
            Some(ErrorKind::Timeout) => HealthVerdict::failed("request timed out"),
            Some(ErrorKind::DnsFailure) => HealthVerdict::failed("service unavailable"),
            Some(ErrorKind::ConnectionRefused) => HealthVerdict::failed("connection refused"),
            Some(ErrorKind::Other) | None => HealthVerdict::failed("request failed"),
        },
    };

    verdict.with_detail(detail)
}

/// `null`, `{}`, `[]` and blank strings carry no information.
fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
