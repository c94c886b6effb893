//! Aggregate report types.
//!
//! These form the stable JSON contract served to the dashboard, independent of
//! upstream payload shapes.

use crate::classify::{HealthLevel, HealthStatus, HealthVerdict};
use crate::probe::{ErrorKind, ProbeResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall status of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallStatus {
    Operational,
    Partial,
    Degraded,
}

/// Counts by verdict plus average latency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_services: usize,
    pub healthy_services: usize,
    pub partial_services: usize,
    pub failed_services: usize,
    pub auth_required_services: usize,
    pub avg_response_time_ms: Option<u64>,
}

impl Summary {
    /// Count verdict statuses and average the latencies that are present.
    pub fn from_parts<'a, S, L>(statuses: S, latencies: L) -> Self
    where
        S: IntoIterator<Item = &'a HealthStatus>,
        L: IntoIterator<Item = Option<u64>>,
    {
        let mut summary = Summary::default();
        for status in statuses {
            summary.total_services += 1;
            match status {
                HealthStatus::Operational => summary.healthy_services += 1,
                HealthStatus::Degraded => summary.partial_services += 1,
                HealthStatus::Failed => summary.failed_services += 1,
                HealthStatus::NeedsAuth => summary.auth_required_services += 1,
            }
        }

        let measured: Vec<u64> = latencies.into_iter().flatten().collect();
        if !measured.is_empty() {
            let total: u64 = measured.iter().sum();
            let count = measured.len() as u64;
            summary.avg_response_time_ms = Some((total + count / 2) / count);
        }

        summary
    }

    /// Overall status policy, applied in order:
    /// more failed than healthy is degraded; any failed or partial is
    /// partial; otherwise operational.
    pub fn overall_status(&self) -> OverallStatus {
        if self.failed_services > self.healthy_services {
            OverallStatus::Degraded
        } else if self.failed_services > 0 || self.partial_services > 0 {
            OverallStatus::Partial
        } else {
            OverallStatus::Operational
        }
    }

    /// Whether every service landed in exactly one bucket.
    pub fn is_consistent(&self) -> bool {
        self.healthy_services
            + self.partial_services
            + self.failed_services
            + self.auth_required_services
            == self.total_services
    }
}

/// One service's line in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReport {
    pub name: String,
    pub description: String,
    pub endpoint: String,
    pub status: HealthStatus,
    pub health_level: HealthLevel,
    pub message: String,
    pub detail: Option<String>,
    pub response_time_ms: Option<u64>,
    pub requires_auth: bool,
    pub http_status: u16,
    pub error_code: Option<ErrorKind>,
    pub payload_size_bytes: usize,
}

impl ServiceReport {
    pub fn new(result: &ProbeResult, verdict: HealthVerdict) -> Self {
        Self {
            name: result.target.name.clone(),
            description: result.target.description.clone(),
            endpoint: result.target.path.clone(),
            status: verdict.status,
            health_level: verdict.health_level,
            message: verdict.message,
            detail: verdict.detail,
            response_time_ms: result.latency_ms,
            requires_auth: result.target.requires_auth,
            http_status: result.http_status,
            error_code: result.error_code,
            payload_size_bytes: result.payload_size_bytes,
        }
    }
}

/// Merged view of one group's probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub overall_status: OverallStatus,
    pub summary: Summary,
    pub services: Vec<ServiceReport>,
    pub generated_at: DateTime<Utc>,
    /// Set when the report is served from an expired cache entry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl AggregateReport {
    /// Build a report from per-service lines, stamped now.
    pub fn from_services(services: Vec<ServiceReport>) -> Self {
        let summary = Summary::from_parts(
            services.iter().map(|s| &s.status),
            services.iter().map(|s| s.response_time_ms),
        );
        Self {
            overall_status: summary.overall_status(),
            summary,
            services,
            generated_at: Utc::now(),
            stale: false,
        }
    }
}
