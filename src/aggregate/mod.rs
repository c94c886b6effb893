//! Aggregator: concurrent fan-out over a group of targets.

mod report;

pub use report::*;

use crate::classify::{Classifier, HealthStatus};
use crate::probe::{ProbeError, ProbeExecutor, ProbeResult};
use crate::registry::ProbeTarget;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Aggregation error types.
///
/// Probe failures never surface here; they become verdicts.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("probe task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runs probes concurrently and merges their verdicts.
#[derive(Clone)]
pub struct Aggregator {
    executor: ProbeExecutor,
    classifier: Arc<Classifier>,
    /// Outbound requests in flight per aggregation.
    max_concurrent_probes: usize,
}

impl Aggregator {
    pub fn new(executor: ProbeExecutor, classifier: Classifier, max_concurrent_probes: usize) -> Self {
        Self {
            executor,
            classifier: Arc::new(classifier),
            max_concurrent_probes: max_concurrent_probes.max(1),
        }
    }

    /// Probe every target, classify each result and merge into one report.
    ///
    /// Waits for all probes; a failing probe never aborts the batch.
    pub async fn aggregate(
        &self,
        targets: &[ProbeTarget],
        timeout: Duration,
    ) -> Result<AggregateReport, AggregateError> {
        let results = self.probe_all(targets, timeout).await?;

        let services: Vec<ServiceReport> = results
            .iter()
            .map(|result| {
                let verdict = self.classifier.classify(&result.target.classifier_key, result);
                if verdict.status == HealthStatus::Failed {
                    tracing::debug!(
                        service = %result.target.name,
                        http_status = result.http_status,
                        message = %verdict.message,
                        "Probe failed"
                    );
                }
                ServiceReport::new(result, verdict)
            })
            .collect();

        let report = AggregateReport::from_services(services);

        tracing::info!(
            total = report.summary.total_services,
            healthy = report.summary.healthy_services,
            partial = report.summary.partial_services,
            failed = report.summary.failed_services,
            auth_required = report.summary.auth_required_services,
            overall = ?report.overall_status,
            "Aggregation complete"
        );

        Ok(report)
    }

    /// Execute one probe per target and join on all of them, in target order.
    ///
    /// Every probe shares one deadline, so time spent waiting for a permit
    /// counts against its timeout and the batch never outlives `timeout`.
    async fn probe_all(
        &self,
        targets: &[ProbeTarget],
        timeout: Duration,
    ) -> Result<Vec<ProbeResult>, AggregateError> {
        let limit = Arc::new(Semaphore::new(self.max_concurrent_probes));
        let deadline = Instant::now() + timeout;

        let handles: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let executor = self.executor.clone();
                let limit = limit.clone();
                tokio::spawn(async move {
                    let Ok(permit) = tokio::time::timeout_at(deadline, limit.acquire_owned()).await else {
                        return ProbeResult::failed(&target, ProbeError::Timeout(timeout), None);
                    };
                    // The semaphore is never closed; a closed one just stops limiting
                    let _permit = permit.ok();
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    executor.execute(&target, remaining).await
                })
            })
            .collect();

        let results = futures::future::try_join_all(handles).await?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::HealthLevel;
    use crate::probe::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn aggregator(limit: usize) -> Aggregator {
        let executor = ProbeExecutor::new("FluxCockpit/test", None).unwrap();
        Aggregator::new(executor, Classifier::default(), limit)
    }

    async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_partial_failures_keep_every_entry() {
        let server = MockServer::start().await;
        let uri = server.uri();

        mount(
            &server,
            "/daemon/getnodecount",
            ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "data": { "total": 13547 } })),
        )
        .await;
        mount(
            &server,
            "/apps/globalappslist",
            ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "data": [{ "name": "a" }] })),
        )
        .await;
        mount(&server, "/daemon/getinfo", ResponseTemplate::new(500)).await;
        mount(&server, "/stats", ResponseTemplate::new(404)).await;
        mount(
            &server,
            "/v1/chat/files",
            ResponseTemplate::new(401).set_body_json(json!({ "error": "missing key" })),
        )
        .await;
        mount(
            &server,
            "/slow",
            ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
        )
        .await;

        let targets = vec![
            ProbeTarget::get("Node Count", &uri, "/daemon/getnodecount", "daemon-node-count"),
            ProbeTarget::get("Applications", &uri, "/apps/globalappslist", "app-list"),
            ProbeTarget::get("Network Info", &uri, "/daemon/getinfo", "daemon-info"),
            ProbeTarget::get("Explorer Stats", &uri, "/stats", "explorer-stats"),
            ProbeTarget::get("FluxINTEL", &uri, "/v1/chat/files", "document-files").with_auth(),
            ProbeTarget::get("Slow", &uri, "/slow", "daemon-info"),
        ];

        let start = Instant::now();
        let report = aggregator(8)
            .aggregate(&targets, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));

        assert_eq!(report.summary.total_services, 6);
        assert_eq!(report.summary.healthy_services, 2);
        assert_eq!(report.summary.failed_services, 3);
        assert_eq!(report.summary.auth_required_services, 1);
        assert!(report.summary.is_consistent());
        assert_eq!(report.overall_status, OverallStatus::Degraded);

        let names: Vec<&str> = report.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Node Count", "Applications", "Network Info", "Explorer Stats", "FluxINTEL", "Slow"]
        );

        let node_count = &report.services[0];
        assert_eq!(node_count.detail.as_deref(), Some("13547 nodes"));

        let auth = &report.services[4];
        assert_eq!(auth.status, HealthStatus::NeedsAuth);
        assert_eq!(auth.health_level, HealthLevel::Healthy);

        let slow = &report.services[5];
        assert_eq!(slow.error_code, Some(ErrorKind::Timeout));
        assert_eq!(slow.http_status, 0);
        assert_eq!(slow.response_time_ms, None);
    }

    #[tokio::test]
    async fn test_all_healthy_is_operational() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/v1/chat/completions",
            ResponseTemplate::new(200).set_body_json(json!({ "choices": [{ "index": 0 }] })),
        )
        .await;

        let target = ProbeTarget::get("FluxGPT", &server.uri(), "/v1/chat/completions", "chat-completion");
        let report = aggregator(1)
            .aggregate(&[target.clone(), target], Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report.overall_status, OverallStatus::Operational);
        assert_eq!(report.summary.healthy_services, 2);
        assert!(report.summary.avg_response_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_queued_probes_stay_within_timeout() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/daemon/getinfo",
            ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
        )
        .await;

        let uri = server.uri();
        let group = |prefix: &str, n: usize| -> Vec<ProbeTarget> {
            (0..n)
                .map(|i| ProbeTarget::get(&format!("{} {}", prefix, i), &uri, "/daemon/getinfo", "daemon-info"))
                .collect()
        };
        let network = group("network", 5);
        let infrastructure = group("infrastructure", 9);

        let aggregator = aggregator(8);
        let timeout = Duration::from_millis(400);
        let start = Instant::now();
        let (a, b) = tokio::join!(
            aggregator.aggregate(&network, timeout),
            aggregator.aggregate(&infrastructure, timeout)
        );
        let elapsed = start.elapsed();

        assert!(elapsed < timeout + Duration::from_millis(300), "took {:?}", elapsed);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.summary.total_services, 5);
        assert_eq!(b.summary.total_services, 9);
        for service in a.services.iter().chain(b.services.iter()) {
            assert_eq!(service.error_code, Some(ErrorKind::Timeout));
        }
    }

    #[tokio::test]
    async fn test_empty_group() {
        let report = aggregator(4).aggregate(&[], Duration::from_secs(1)).await.unwrap();
        assert_eq!(report.summary.total_services, 0);
        assert_eq!(report.summary.avg_response_time_ms, None);
        assert_eq!(report.overall_status, OverallStatus::Operational);
    }
}
