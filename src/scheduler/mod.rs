//! Background refresher that keeps group reports warm in the cache.

use crate::aggregate::Aggregator;
use crate::cache::ReportCache;
use crate::registry::Registry;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

/// Periodically aggregates every group and stores the reports.
pub struct Refresher {
    registry: Arc<Registry>,
    aggregator: Aggregator,
    cache: Arc<ReportCache>,
    probe_timeout: Duration,
    interval: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl Refresher {
    pub fn new(
        registry: Arc<Registry>,
        aggregator: Aggregator,
        cache: Arc<ReportCache>,
        probe_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            aggregator,
            cache,
            probe_timeout,
            interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the refresh loop. Does nothing when the interval is zero.
    pub async fn start(&self) {
        if self.interval.is_zero() {
            tracing::info!("Refresher disabled");
            return;
        }

        let (tx, mut rx) = broadcast::channel(1);
        {
            let mut stop = self.stop.lock().await;
            if stop.is_some() {
                return; // Already running
            }
            *stop = Some(tx);
        }

        let registry = self.registry.clone();
        let aggregator = self.aggregator.clone();
        let cache = self.cache.clone();
        let probe_timeout = self.probe_timeout;
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!("Refresher started (every {:?})", self.interval);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        refresh_all(&registry, &aggregator, &cache, probe_timeout).await;
                    }
                }
            }
            tracing::info!("Refresher stopped");
        });
    }

    /// Stop the refresh loop.
    pub async fn stop(&self) {
        let mut stop = self.stop.lock().await;
        if let Some(tx) = stop.take() {
            let _ = tx.send(());
        }
    }
}

/// Refresh every group once, concurrently.
async fn refresh_all(
    registry: &Registry,
    aggregator: &Aggregator,
    cache: &Arc<ReportCache>,
    probe_timeout: Duration,
) {
    let mut handles = Vec::new();

    for key in registry.group_keys() {
        let Some(targets) = registry.group(key) else {
            continue;
        };
        let key = key.to_string();
        let aggregator = aggregator.clone();
        let cache = cache.clone();

        handles.push(tokio::spawn(async move {
            // Jitter to avoid bursting every upstream at once
            let jitter = rand::random::<u64>() % 250;
            tokio::time::sleep(Duration::from_millis(jitter)).await;

            match aggregator.aggregate(&targets, probe_timeout).await {
                Ok(report) => cache.put(&key, report).await,
                Err(e) => tracing::error!("Refresher: failed to aggregate {}: {}", key, e),
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Refresher: refresh task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::probe::ProbeExecutor;
    use crate::registry::ProbeTarget;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn refresher(server: &MockServer, interval: Duration) -> (Refresher, Arc<ReportCache>) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "data": 42 })))
            .mount(server)
            .await;

        let mut registry = Registry::default();
        registry.insert(ProbeTarget::get("Node Count", &server.uri(), "/daemon/getnodecount", "daemon-node-count"));
        registry.define_group("network", vec!["Node Count".to_string()]);

        let executor = ProbeExecutor::new("FluxCockpit/test", None).unwrap();
        let aggregator = Aggregator::new(executor, Classifier::default(), 4);
        let cache = Arc::new(ReportCache::new());

        let refresher = Refresher::new(
            Arc::new(registry),
            aggregator,
            cache.clone(),
            Duration::from_secs(2),
            interval,
        );
        (refresher, cache)
    }

    #[tokio::test]
    async fn test_refresher_populates_cache() {
        let server = MockServer::start().await;
        let (refresher, cache) = refresher(&server, Duration::from_millis(100)).await;

        refresher.start().await;

        let mut populated = false;
        for _ in 0..40 {
            if cache.peek("network").await.is_some() {
                populated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        refresher.stop().await;

        assert!(populated, "refresher never stored a report");
        let (report, _) = cache.peek("network").await.unwrap();
        assert_eq!(report.summary.healthy_services, 1);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_refresher() {
        let server = MockServer::start().await;
        let (refresher, cache) = refresher(&server, Duration::ZERO).await;

        refresher.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.len().await, 0);
    }
}
