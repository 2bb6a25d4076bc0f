//! Combined health view of all services.
//!
//! # Responsibilities
//! - Probe every service concurrently
//! - Pair each probe with the service's circuit breaker snapshot
//! - Keep the most recent report for cheap reads
//!
//! # Design Decisions
//! - Probes have their own timeout and never count toward breakers
//! - One DOWN service degrades the whole gateway

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::{HealthCheckConfig, ServiceTarget};
use crate::dispatch::HttpClient;
use crate::health::probe::probe;
use crate::resilience::clock::unix_millis;
use crate::resilience::{BreakerRegistry, BreakerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "DEGRADED")]
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub circuit_breaker: Option<BreakerSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    pub status: OverallStatus,
    /// Unix milliseconds.
    pub timestamp: u64,
    pub uptime_secs: u64,
    pub services: BTreeMap<String, ServiceHealth>,
}

impl OverallHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == OverallStatus::Ok
    }
}

/// Probes services and combines the results with breaker state.
#[derive(Debug)]
pub struct HealthAggregator {
    targets: Vec<ServiceTarget>,
    registry: Arc<BreakerRegistry>,
    client: HttpClient,
    config: HealthCheckConfig,
    started: Instant,
    latest: ArcSwapOption<OverallHealth>,
}

impl HealthAggregator {
    pub fn new(
        targets: Vec<ServiceTarget>,
        registry: Arc<BreakerRegistry>,
        client: HttpClient,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            targets,
            registry,
            client,
            config,
            started: Instant::now(),
            latest: ArcSwapOption::empty(),
        }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Probe every service now.
    pub async fn check_all(&self) -> OverallHealth {
        let timeout = self.config.probe_timeout();
        let probes = self.targets.iter().map(|target| async move {
            let outcome = probe(&self.client, &target.url, &self.config.path, timeout).await;
            (target, outcome)
        });

        let services: BTreeMap<String, ServiceHealth> = join_all(probes)
            .await
            .into_iter()
            .map(|(target, outcome)| {
                let health = ServiceHealth {
                    status: if outcome.is_up() {
                        ServiceStatus::Up
                    } else {
                        ServiceStatus::Down
                    },
                    status_code: outcome.status_code,
                    circuit_breaker: self
                        .registry
                        .breaker(&target.name)
                        .ok()
                        .map(|breaker| breaker.snapshot()),
                    error: outcome.error,
                };
                (target.name.clone(), health)
            })
            .collect();

        let status = if services.values().all(|s| s.status == ServiceStatus::Up) {
            OverallStatus::Ok
        } else {
            OverallStatus::Degraded
        };

        OverallHealth {
            status,
            timestamp: unix_millis(),
            uptime_secs: self.uptime_secs(),
            services,
        }
    }

    /// Probe every service and remember the result.
    pub async fn refresh(&self) -> Arc<OverallHealth> {
        let report = Arc::new(self.check_all().await);
        self.latest.store(Some(Arc::clone(&report)));
        report
    }

    /// Most recent report, if any check has run.
    pub fn latest(&self) -> Option<Arc<OverallHealth>> {
        self.latest.load_full()
    }
}
