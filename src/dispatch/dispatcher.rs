//! Request forwarding under circuit breaker protection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::config::{Environment, ServiceTarget};
use crate::dispatch::upstream::UpstreamClient;
use crate::http::request::request_id;
use crate::http::response;
use crate::resilience::BreakerRegistry;

/// Forwards requests to named services through their circuit breakers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<BreakerRegistry>,
    targets: HashMap<String, ServiceTarget>,
    client: UpstreamClient,
    environment: Environment,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<BreakerRegistry>,
        targets: Vec<ServiceTarget>,
        client: UpstreamClient,
        environment: Environment,
    ) -> Self {
        let targets = targets
            .into_iter()
            .map(|target| (target.name.clone(), target))
            .collect();

        Self {
            registry,
            targets,
            client,
            environment,
        }
    }

    /// Forward `request` to `service`.
    ///
    /// Never fails: breaker rejections, timeouts and upstream errors all
    /// become gateway error responses.
    pub async fn forward(&self, service: &str, request: Request<Body>) -> Response {
        let request_id = request_id(request.headers()).to_string();

        let Some(target) = self.targets.get(service) else {
            tracing::warn!(request_id = %request_id, service = %service, "Unknown service");
            return response::bad_gateway(format!("Unknown service {service}"));
        };

        let breaker = match self.registry.get_breaker(service, Some(&target.breaker)) {
            Ok(breaker) => breaker,
            Err(e) => {
                tracing::error!(request_id = %request_id, service = %service, error = %e, "Circuit breaker unavailable");
                return response::bad_gateway(format!("{service} is misconfigured"));
            }
        };

        let upstream = match UpstreamClient::prepare(&target.url, request) {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(request_id = %request_id, service = %service, error = %e, "Failed to build upstream request");
                return response::bad_gateway("Invalid upstream request");
            }
        };

        tracing::debug!(
            request_id = %request_id,
            service = %service,
            uri = %upstream.uri(),
            "Forwarding request"
        );

        let client = self.client.clone();
        let environment = self.environment;
        let name = service.to_string();
        let result = breaker
            .execute_with_fallback(
                move || async move { client.send(upstream).await },
                move || async move {
                    let detail = format!("circuit breaker for {name} is open");
                    response::service_unavailable(&name, Some(detail), environment)
                },
            )
            .await;

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id = %request_id, service = %service, error = %e, "Upstream call failed");
                response::service_unavailable(service, Some(e.to_string()), self.environment)
            }
        }
    }
}
