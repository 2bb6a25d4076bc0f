//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit, timeout, rate limit)
//! - Serve `GET /health` from the health aggregator
//! - Dispatch everything else to the routing engine and dispatcher
//! - Start the health poller and the admin API alongside the listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{self, AdminState};
use crate::dispatch::Dispatcher;
use crate::health::{HealthAggregator, HealthMonitor};
use crate::http::request::{request_id, request_span, MakeRequestUuidV4};
use crate::http::response;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::startup::Gateway;
use crate::observability::metrics;
use crate::routing::Router as ServiceRouter;
use crate::security::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ServiceRouter>,
    pub dispatcher: Arc<Dispatcher>,
    pub health: Arc<HealthAggregator>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    gateway: Gateway,
    shutdown: Shutdown,
}

impl HttpServer {
    pub fn new(gateway: Gateway, shutdown: Shutdown) -> Self {
        let router = Self::build_router(&gateway);
        Self {
            router,
            gateway,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(gateway: &Gateway) -> Router {
        let state = AppState {
            router: gateway.router.clone(),
            dispatcher: gateway.dispatcher.clone(),
            health: gateway.health.clone(),
        };

        let config = &gateway.config;
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state);

        if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let config = &self.gateway.config;
        if config.health_check.enabled {
            let monitor = HealthMonitor::new(self.gateway.health.clone(), &config.health_check);
            tokio::spawn(monitor.run(self.shutdown.subscribe()));
        }

        if config.admin.enabled {
            let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
            let admin_router = admin::setup_admin_router(AdminState::from_gateway(&self.gateway));
            let mut rx = self.shutdown.subscribe();
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API starting");

            tokio::spawn(async move {
                let result = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(async move {
                        let _ = rx.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            });
        }

        let mut rx = self.shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let report = state.health.refresh().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(&*report)).into_response()
}

/// Main proxy handler.
/// Looks up the service for the request and forwards it.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(route) = state.router.match_request(&request) else {
        tracing::warn!(
            request_id = %request_id(request.headers()),
            method = %method,
            path = %path,
            "No route matched"
        );
        metrics::record_request(method.as_str(), 404, "none", start_time);
        return response::not_found(&method, &path);
    };
    let service = route.service.clone();

    let response = state.dispatcher.forward(&service, request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), &service, start_time);
    response
}
