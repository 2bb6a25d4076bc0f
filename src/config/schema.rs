//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::validation::ValidationError;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment; controls error detail and log format.
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend services the gateway forwards to.
    pub services: Vec<ServiceConfig>,

    /// Default circuit breaker settings, overridable per service.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health probe settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Administrative API settings.
    pub admin: AdminConfig,
}

impl GatewayConfig {
    /// Resolve every configured service into a runtime target.
    pub fn service_targets(&self) -> Result<Vec<ServiceTarget>, ValidationError> {
        self.services
            .iter()
            .map(|service| service.target(&self.circuit_breaker))
            .collect()
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// A backend service and how requests reach it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identity; also the circuit breaker key.
    pub name: String,

    /// Base URL of the service (e.g., "http://127.0.0.1:3001").
    pub url: String,

    /// Path prefix routed to this service.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Host header to match (exact match).
    #[serde(default)]
    pub host: Option<String>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// Per-service circuit breaker overrides.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerOverrides,
}

impl ServiceConfig {
    /// Resolve into a runtime target, applying breaker overrides on top of `defaults`.
    pub fn target(&self, defaults: &CircuitBreakerConfig) -> Result<ServiceTarget, ValidationError> {
        let url = Url::parse(&self.url).map_err(|e| ValidationError::InvalidServiceUrl {
            service: self.name.clone(),
            reason: e.to_string(),
        })?;

        Ok(ServiceTarget {
            name: self.name.clone(),
            url,
            breaker: self.circuit_breaker.apply(defaults),
        })
    }
}

/// Resolved service: parsed URL plus the effective breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTarget {
    pub name: String,
    pub url: Url,
    pub breaker: CircuitBreakerConfig,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Failures (since the last close) that open the circuit.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a trial call, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Period of the metrics report, in milliseconds.
    pub monitoring_period_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            monitoring_period_ms: 10_000,
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, reset_timeout_ms: u64) -> Self {
        self.reset_timeout_ms = reset_timeout_ms;
        self
    }

    #[must_use]
    pub const fn with_monitoring_period_ms(mut self, period_ms: u64) -> Self {
        self.monitoring_period_ms = period_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn monitoring_period(&self) -> Duration {
        Duration::from_millis(self.monitoring_period_ms)
    }

    /// Check the settings, reporting the first problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.problems("circuit_breaker").into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every problem with these settings, labelled with `scope`.
    pub fn problems(&self, scope: &str) -> Vec<ValidationError> {
        let checks = [
            ("timeout_ms", self.timeout_ms),
            ("failure_threshold", u64::from(self.failure_threshold)),
            ("reset_timeout_ms", self.reset_timeout_ms),
            ("monitoring_period_ms", self.monitoring_period_ms),
        ];

        checks
            .into_iter()
            .filter(|(_, value)| *value == 0)
            .map(|(field, _)| ValidationError::MustBePositive {
                field: format!("{scope}.{field}"),
            })
            .collect()
    }
}

/// Optional per-service overrides of [`CircuitBreakerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerOverrides {
    pub timeout_ms: Option<u64>,
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
    pub monitoring_period_ms: Option<u64>,
}

impl CircuitBreakerOverrides {
    /// Merge onto `base`, keeping base values for unset fields.
    pub fn apply(&self, base: &CircuitBreakerConfig) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            reset_timeout_ms: self.reset_timeout_ms.unwrap_or(base.reset_timeout_ms),
            monitoring_period_ms: self.monitoring_period_ms.unwrap_or(base.monitoring_period_ms),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background health poller.
    pub enabled: bool,

    /// Poll interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in milliseconds (independent of breaker timeouts).
    pub probe_timeout_ms: u64,

    /// Path to probe on every service.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            probe_timeout_ms: 2_000,
            path: "/health".to_string(),
        }
    }
}

impl HealthCheckConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Timeout configuration for the client-facing side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests each client IP may make per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 15 * 60,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format; defaults to JSON in production and pretty otherwise.
    pub log_format: Option<LogFormat>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: None,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn resolved_log_format(&self, environment: Environment) -> LogFormat {
        self.log_format.unwrap_or(match environment {
            Environment::Production => LogFormat::Json,
            Environment::Development => LogFormat::Pretty,
        })
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:3100".to_string(),
        }
    }
}
