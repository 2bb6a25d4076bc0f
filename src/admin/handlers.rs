use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::health::OverallHealth;
use crate::http::response::ErrorBody;
use crate::resilience::{BreakerSnapshot, CircuitState};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub breakers: usize,
    pub open_breakers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub reset: Vec<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let states = state.registry.all_states();
    let open_breakers = states
        .iter()
        .filter(|(_, s)| s.state != CircuitState::Closed)
        .map(|(name, _)| name.clone())
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs: state.health.uptime_secs(),
        breakers: states.len(),
        open_breakers,
    })
}

/// Latest background report; probes now if none exists yet.
pub async fn get_health(State(state): State<AdminState>) -> Json<OverallHealth> {
    let report = match state.health.latest() {
        Some(report) => report,
        None => state.health.refresh().await,
    };
    Json(report.as_ref().clone())
}

pub async fn get_breakers(
    State(state): State<AdminState>,
) -> Json<BTreeMap<String, BreakerSnapshot>> {
    Json(state.registry.all_states())
}

pub async fn reset_breaker(
    State(state): State<AdminState>,
    Path(service): Path<String>,
) -> Result<Json<ResetResponse>, (StatusCode, Json<ErrorBody>)> {
    match state.registry.reset(&service) {
        Ok(()) => Ok(Json(ResetResponse {
            reset: vec![service],
        })),
        Err(e) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "Not Found".to_string(),
                message: e.to_string(),
                detail: None,
            }),
        )),
    }
}

pub async fn reset_all_breakers(State(state): State<AdminState>) -> Json<ResetResponse> {
    state.registry.reset_all();
    Json(ResetResponse {
        reset: state.registry.identities(),
    })
}
