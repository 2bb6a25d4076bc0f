//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and resolve service targets
//! - Initialize all subsystems in dependency order
//! - Pre-create a circuit breaker for every configured service
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - This is the only place components are wired together; nothing is global

use std::sync::Arc;

use thiserror::Error;

use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::dispatch::{Dispatcher, UpstreamClient};
use crate::health::HealthAggregator;
use crate::lifecycle::shutdown::Shutdown;
use crate::resilience::{BreakerRegistry, RegistryError};
use crate::routing::Router;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Fully wired gateway components.
#[derive(Debug)]
pub struct Gateway {
    pub config: GatewayConfig,
    pub registry: Arc<BreakerRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub health: Arc<HealthAggregator>,
    pub router: Arc<Router>,
}

impl Gateway {
    /// Build every component from `config`. Breaker monitors stop on `shutdown`.
    pub fn bootstrap(config: GatewayConfig, shutdown: &Shutdown) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let targets = config
            .service_targets()
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        let registry = Arc::new(BreakerRegistry::with_monitoring(
            config.circuit_breaker.clone(),
            shutdown.clone(),
        ));
        for target in &targets {
            registry.get_breaker(&target.name, Some(&target.breaker))?;
        }

        let client = UpstreamClient::new();
        let health = Arc::new(HealthAggregator::new(
            targets.clone(),
            registry.clone(),
            client.http().clone(),
            config.health_check.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            targets,
            client,
            config.environment,
        ));
        let router = Arc::new(Router::from_services(&config.services));

        tracing::info!(
            services = config.services.len(),
            environment = ?config.environment,
            "Gateway initialized"
        );

        Ok(Self {
            config,
            registry,
            dispatcher,
            health,
            router,
        })
    }
}
