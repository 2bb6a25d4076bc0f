//! Administrative API.
//!
//! Served on its own listener and guarded by a bearer API key.
//!
//! ```text
//! GET  /admin/status                    gateway summary
//! GET  /admin/health                    latest health report
//! GET  /admin/breakers                  every breaker snapshot
//! POST /admin/breakers/reset            reset all breakers
//! POST /admin/breakers/{service}/reset  reset one breaker
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::health::HealthAggregator;
use crate::lifecycle::startup::Gateway;
use crate::resilience::BreakerRegistry;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<BreakerRegistry>,
    pub health: Arc<HealthAggregator>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn from_gateway(gateway: &Gateway) -> Self {
        Self {
            registry: gateway.registry.clone(),
            health: gateway.health.clone(),
            api_key: Arc::from(gateway.config.admin.api_key.as_str()),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/health", get(get_health))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/breakers/reset", post(reset_all_breakers))
        .route("/admin/breakers/{service}/reset", post(reset_breaker))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
