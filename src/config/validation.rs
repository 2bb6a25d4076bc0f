//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Keep every breaker timeout below the outer request timeout
//! - Check service identities are unique and URLs usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: String, value: String },

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service {0} is defined more than once")]
    DuplicateService(String),

    #[error("service {service} has an invalid url: {reason}")]
    InvalidServiceUrl { service: String, reason: String },

    #[error("service {service}: path_prefix must start with '/' (got {prefix})")]
    InvalidPathPrefix { service: String, prefix: String },

    #[error("health_check.path must start with '/' (got {0})")]
    InvalidHealthPath(String),

    #[error("{field} ({timeout_ms}ms) must be below timeouts.request_secs ({request_ms}ms)")]
    BreakerTimeoutTooLong {
        field: String,
        timeout_ms: u64,
        request_ms: u64,
    },

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    MissingAdminKey,
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    let request_ms = config.timeouts.request_secs.saturating_mul(1000);
    errors.extend(config.circuit_breaker.problems("circuit_breaker"));
    check_breaker_timeout(&mut errors, "circuit_breaker", config.circuit_breaker.timeout_ms, request_ms);

    let mut seen = HashSet::new();
    for service in &config.services {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName);
            continue;
        }
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        match service.target(&config.circuit_breaker) {
            Ok(target) => {
                if target.url.scheme() != "http" {
                    errors.push(ValidationError::InvalidServiceUrl {
                        service: service.name.clone(),
                        reason: format!("unsupported scheme {}", target.url.scheme()),
                    });
                }
                let scope = format!("services.{}.circuit_breaker", service.name);
                errors.extend(target.breaker.problems(&scope));
                check_breaker_timeout(&mut errors, &scope, target.breaker.timeout_ms, request_ms);
            }
            Err(e) => errors.push(e),
        }

        if let Some(prefix) = &service.path_prefix {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::InvalidPathPrefix {
                    service: service.name.clone(),
                    prefix: prefix.clone(),
                });
            }
        }
    }

    if config.health_check.probe_timeout_ms == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "health_check.probe_timeout_ms".to_string(),
        });
    }
    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "health_check.interval_secs".to_string(),
        });
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(config.health_check.path.clone()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "timeouts.request_secs".to_string(),
        });
    }

    if config.rate_limit.enabled {
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::MustBePositive {
                field: "rate_limit.max_requests".to_string(),
            });
        }
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::MustBePositive {
                field: "rate_limit.window_secs".to_string(),
            });
        }
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::MustBePositive {
            field: "limits.max_body_size".to_string(),
        });
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The breaker must give up before the outer request timeout drops the call.
fn check_breaker_timeout(errors: &mut Vec<ValidationError>, scope: &str, timeout_ms: u64, request_ms: u64) {
    if request_ms > 0 && timeout_ms >= request_ms {
        errors.push(ValidationError::BreakerTimeoutTooLong {
            field: format!("{scope}.timeout_ms"),
            timeout_ms,
            request_ms,
        });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CircuitBreakerOverrides, ServiceConfig};

    fn service(name: &str, url: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            url: url.to_string(),
            path_prefix: Some(format!("/api/{name}")),
            host: None,
            priority: 0,
            circuit_breaker: CircuitBreakerOverrides::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.services.push(service("user", "http://127.0.0.1:3001"));
        config.services.push(service("user", "ftp://127.0.0.1:3002"));
        config.services[0].circuit_breaker.failure_threshold = Some(0);
        config.health_check.path = "health".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidAddress {
            field: "listener.bind_address".to_string(),
            value: "not-an-address".to_string(),
        }));
        assert!(errors.contains(&ValidationError::DuplicateService("user".to_string())));
        assert!(errors.contains(&ValidationError::MustBePositive {
            field: "services.user.circuit_breaker.failure_threshold".to_string(),
        }));
        assert!(errors.contains(&ValidationError::InvalidHealthPath("health".to_string())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidServiceUrl { .. })));
    }

    #[test]
    fn test_rate_limit_and_body_limit_ranges() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_secs = 0;
        config.limits.max_body_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MustBePositive {
                    field: "rate_limit.window_secs".to_string()
                },
                ValidationError::MustBePositive {
                    field: "limits.max_body_size".to_string()
                },
            ]
        );

        // A disabled limiter is not checked.
        config.rate_limit.enabled = false;
        config.limits.max_body_size = 1;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_requires_key() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "  ".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingAdminKey]);
    }

    #[test]
    fn test_breaker_timeout_must_fit_request_timeout() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 1;
        config.circuit_breaker.timeout_ms = 800;
        let mut svc = service("order", "http://127.0.0.1:3002");
        svc.circuit_breaker.timeout_ms = Some(5000);
        config.services.push(svc);
        config.services.push(service("user", "http://127.0.0.1:3001"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::BreakerTimeoutTooLong {
                field: "services.order.circuit_breaker.timeout_ms".to_string(),
                timeout_ms: 5000,
                request_ms: 1000,
            }]
        );

        config.services[0].circuit_breaker.timeout_ms = Some(1000);
        assert!(validate_config(&config).is_err());
        config.services[0].circuit_breaker.timeout_ms = Some(999);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_default_breaker_timeout_checked_too() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 5;

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::BreakerTimeoutTooLong { field, .. } if field == "circuit_breaker.timeout_ms"
        ));
    }

    #[test]
    fn test_rejects_relative_prefix() {
        let mut config = GatewayConfig::default();
        let mut svc = service("payment", "http://127.0.0.1:3003");
        svc.path_prefix = Some("api/payments".to_string());
        config.services.push(svc);

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidPathPrefix { .. }));
    }
}
