//! Gateway-generated responses.
//!
//! # Responsibilities
//! - Uniform JSON error bodies for responses the gateway produces itself
//! - Hide internal error detail outside development
//!
//! # Design Decisions
//! - Backend responses are never rewritten; only gateway errors use this
//! - `detail` is omitted from the body entirely when not shown

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::Environment;

/// JSON body of every gateway-generated error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

/// 503 answer for a service whose breaker is open or whose call failed.
pub fn service_unavailable(service: &str, detail: Option<String>, environment: Environment) -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        ErrorBody {
            error: "Service Unavailable".to_string(),
            message: format!("{service} service is temporarily unavailable"),
            detail: detail.filter(|_| !environment.is_production()),
        },
    )
}

/// 502 answer when the gateway cannot build a request for the service.
pub fn bad_gateway(message: impl Into<String>) -> Response {
    error_response(
        StatusCode::BAD_GATEWAY,
        ErrorBody {
            error: "Bad Gateway".to_string(),
            message: message.into(),
            detail: None,
        },
    )
}

/// 404 answer for requests no route accepts.
pub fn not_found(method: &Method, path: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        ErrorBody {
            error: "Not Found".to_string(),
            message: format!("Route {method} {path} not found"),
            detail: None,
        },
    )
}
