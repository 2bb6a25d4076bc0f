//! Registry of per-backend circuit breakers.
//!
//! # Responsibilities
//! - Hand out exactly one breaker per backend identity
//! - Apply default settings when no per-backend config is given
//! - Start a breaker's monitor task when the breaker is created
//! - Bulk state views and resets for health and admin endpoints
//!
//! # Design Decisions
//! - Creation goes through the DashMap entry API so concurrent first
//!   requests for one identity cannot create two breakers
//! - Config passed for an identity that already exists is ignored
//! - Breakers are never removed

use std::collections::BTreeMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::config::{CircuitBreakerConfig, ValidationError};
use crate::lifecycle::shutdown::Shutdown;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

/// Errors from registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no circuit breaker registered for backend {0}")]
    UnknownBackend(String),

    #[error("invalid circuit breaker config for {identity}: {source}")]
    InvalidConfig {
        identity: String,
        source: ValidationError,
    },
}

/// Keyed collection of circuit breakers.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
    defaults: CircuitBreakerConfig,
    monitor: Option<Shutdown>,
}

impl BreakerRegistry {
    /// Registry without periodic metrics reports.
    pub fn new(defaults: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            monitor: None,
        }
    }

    /// Registry whose breakers report metrics until `shutdown` fires.
    pub fn with_monitoring(defaults: CircuitBreakerConfig, shutdown: Shutdown) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            monitor: Some(shutdown),
        }
    }

    /// Return the breaker for `identity`, creating it on first use.
    pub fn get_breaker(
        &self,
        identity: &str,
        config: Option<&CircuitBreakerConfig>,
    ) -> Result<CircuitBreaker, RegistryError> {
        if let Some(existing) = self.breakers.get(identity) {
            return Ok(existing.value().clone());
        }

        let created = match self.breakers.entry(identity.to_string()) {
            Entry::Occupied(entry) => return Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let config = config.unwrap_or(&self.defaults).clone();
                let breaker = CircuitBreaker::new(identity, config).map_err(|source| {
                    RegistryError::InvalidConfig {
                        identity: identity.to_string(),
                        source,
                    }
                })?;
                entry.insert(breaker.clone());
                breaker
            }
        };

        tracing::info!(
            backend = %identity,
            failure_threshold = created.config().failure_threshold,
            timeout_ms = created.config().timeout_ms,
            reset_timeout_ms = created.config().reset_timeout_ms,
            "Circuit breaker created"
        );
        if let Some(shutdown) = &self.monitor {
            created.spawn_monitor(shutdown.subscribe());
        }
        Ok(created)
    }

    /// Existing breaker for `identity`.
    pub fn breaker(&self, identity: &str) -> Result<CircuitBreaker, RegistryError> {
        self.breakers
            .get(identity)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::UnknownBackend(identity.to_string()))
    }

    /// Snapshot of every breaker, keyed by identity.
    pub fn all_states(&self) -> BTreeMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Reset one breaker.
    pub fn reset(&self, identity: &str) -> Result<(), RegistryError> {
        self.breaker(identity)?.reset();
        Ok(())
    }

    /// Reset every breaker.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        tracing::info!(count = self.breakers.len(), "All circuit breakers reset");
    }

    pub fn identities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use std::sync::Arc;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(CircuitBreakerConfig::default().with_failure_threshold(1))
    }

    #[tokio::test]
    async fn test_same_identity_same_breaker() {
        let registry = registry();
        let a = registry.get_breaker("user", None).unwrap();
        let b = registry.get_breaker("user", None).unwrap();
        assert!(a.ptr_eq(&b));

        let _ = a.execute(|| async { Err::<(), String>("down".into()) }).await;
        assert_eq!(b.snapshot().state, CircuitState::Open);
        assert_eq!(registry.all_states()["user"].state, CircuitState::Open);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_yields_one_breaker() {
        let registry = Arc::new(registry());
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.get_breaker("order", None).unwrap()
            }));
        }

        let mut breakers = Vec::new();
        for task in tasks {
            breakers.push(task.await.unwrap());
        }
        assert!(breakers.windows(2).all(|w| w[0].ptr_eq(&w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_first_config_wins() {
        let registry = registry();
        let custom = CircuitBreakerConfig::default().with_failure_threshold(9);
        let first = registry.get_breaker("payment", Some(&custom)).unwrap();
        assert_eq!(first.config().failure_threshold, 9);

        let other = CircuitBreakerConfig::default().with_failure_threshold(2);
        let second = registry.get_breaker("payment", Some(&other)).unwrap();
        assert_eq!(second.config().failure_threshold, 9);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let registry = registry();
        let bad = CircuitBreakerConfig::default().with_timeout_ms(0);
        let err = registry.get_breaker("user", Some(&bad)).unwrap_err();

        assert!(matches!(err, RegistryError::InvalidConfig { ref identity, .. } if identity == "user"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_backend() {
        let registry = registry();
        assert_eq!(
            registry.reset("missing").unwrap_err(),
            RegistryError::UnknownBackend("missing".to_string())
        );
    }

    #[tokio::test]
    async fn test_reset_all() {
        let registry = registry();
        for name in ["user", "order"] {
            let breaker = registry.get_breaker(name, None).unwrap();
            let _ = breaker.execute(|| async { Err::<(), String>("down".into()) }).await;
        }
        assert!(registry
            .all_states()
            .values()
            .all(|s| s.state == CircuitState::Open));

        registry.reset_all();

        let states = registry.all_states();
        assert_eq!(states.len(), 2);
        assert!(states.values().all(|s| s.state == CircuitState::Closed));
        assert!(states.values().all(|s| s.metrics.failed_requests == 1));
        assert_eq!(registry.identities(), vec!["order", "user"]);
    }
}
