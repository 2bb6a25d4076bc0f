//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every service through the aggregator
//! - Publish backend health gauges and log UP/DOWN changes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::aggregator::{HealthAggregator, ServiceStatus};
use crate::observability::metrics;

pub struct HealthMonitor {
    aggregator: Arc<HealthAggregator>,
    interval: Duration,
    last: HashMap<String, ServiceStatus>,
}

impl HealthMonitor {
    pub fn new(aggregator: Arc<HealthAggregator>, config: &HealthCheckConfig) -> Self {
        Self {
            aggregator,
            interval: Duration::from_secs(config.interval_secs),
            last: HashMap::new(),
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            path = %self.aggregator.config().path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn poll(&mut self) {
        let report = self.aggregator.refresh().await;

        for (name, service) in &report.services {
            let up = service.status == ServiceStatus::Up;
            metrics::record_backend_health(name, up);

            let previous = self.last.insert(name.clone(), service.status);
            if previous == Some(service.status) {
                continue;
            }
            if up {
                tracing::info!(service = %name, "Service is UP");
            } else {
                tracing::warn!(
                    service = %name,
                    error = service.error.as_deref().unwrap_or("unknown"),
                    "Service is DOWN"
                );
            }
        }
    }
}
