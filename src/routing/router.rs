//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes, one per configured service
//! - Look up the service for a request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in precedence order (acceptable for typical service counts)
//! - Higher priority first; among equals, the longer path prefix wins
//! - Explicit no-match rather than silent default

use axum::body::Body;
use axum::http::Request;

use crate::config::ServiceConfig;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// A compiled route to one service.
#[derive(Debug)]
pub struct Route {
    pub service: String,
    pub priority: u32,
    prefix_len: usize,
    matcher: AndMatcher,
}

impl Route {
    fn from_service(service: &ServiceConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &service.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        if let Some(prefix) = &service.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }

        Self {
            service: service.name.clone(),
            priority: service.priority,
            prefix_len: service.path_prefix.as_deref().map_or(0, str::len),
            matcher: AndMatcher::new(matchers),
        }
    }

    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.matcher.matches(req)
    }
}

/// Immutable routing table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes for the configured services.
    pub fn from_services(services: &[ServiceConfig]) -> Self {
        let mut routes: Vec<Route> = services.iter().map(Route::from_service).collect();
        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.prefix_len.cmp(&a.prefix_len))
        });

        for route in &routes {
            tracing::debug!(service = %route.service, priority = route.priority, "Route compiled");
        }
        Self { routes }
    }

    /// First route matching the request, in precedence order.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(req))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerOverrides;

    fn service(name: &str, prefix: Option<&str>, host: Option<&str>, priority: u32) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            url: "http://127.0.0.1:1".to_string(),
            path_prefix: prefix.map(str::to_string),
            host: host.map(str::to_string),
            priority,
            circuit_breaker: CircuitBreakerOverrides::default(),
        }
    }

    fn get(host: &str, path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header("Host", host)
            .body(Body::empty())
            .unwrap()
    }

    fn matched<'a>(router: &'a Router, host: &str, path: &str) -> Option<&'a str> {
        router.match_request(&get(host, path)).map(|r| r.service.as_str())
    }

    #[test]
    fn test_longest_prefix_wins() {
        let router = Router::from_services(&[
            service("api", Some("/api"), None, 0),
            service("user", Some("/api/users"), None, 0),
        ]);

        assert_eq!(matched(&router, "gw", "/api/users/1"), Some("user"));
        assert_eq!(matched(&router, "gw", "/api/orders"), Some("api"));
        assert_eq!(matched(&router, "gw", "/static"), None);
    }

    #[test]
    fn test_priority_beats_prefix_length() {
        let router = Router::from_services(&[
            service("user", Some("/api/users"), None, 0),
            service("catch", Some("/api"), None, 10),
        ]);

        assert_eq!(matched(&router, "gw", "/api/users/1"), Some("catch"));
    }

    #[test]
    fn test_host_and_prefix() {
        let router = Router::from_services(&[
            service("admin-orders", Some("/orders"), Some("admin.local"), 0),
            service("order", Some("/orders"), None, 0),
        ]);

        // Equal priority and prefix: configuration order is kept.
        assert_eq!(matched(&router, "admin.local", "/orders/1"), Some("admin-orders"));
        assert_eq!(matched(&router, "shop.local", "/orders/1"), Some("order"));
    }

    #[test]
    fn test_service_without_conditions_is_wildcard() {
        let router = Router::from_services(&[service("default", None, None, 0)]);
        assert_eq!(matched(&router, "any", "/whatever"), Some("default"));
    }
}
