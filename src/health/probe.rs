//! Single health probe against one service.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use tokio::time;
use url::Url;

use crate::dispatch::HttpClient;

/// Result of probing one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn failed(error: String) -> Self {
        Self {
            status_code: None,
            error: Some(error),
        }
    }

    /// A service is up only when its health endpoint answers 2xx.
    pub fn is_up(&self) -> bool {
        self.status_code.is_some_and(|code| (200..300).contains(&code))
    }
}

pub fn probe_uri(base: &Url, path: &str) -> String {
    format!(
        "{}{}{}",
        base.origin().ascii_serialization(),
        base.path().trim_end_matches('/'),
        path
    )
}

/// `GET <base><path>`, bounded by `timeout`.
pub async fn probe(client: &HttpClient, base: &Url, path: &str, timeout: Duration) -> ProbeOutcome {
    let request = match Request::builder()
        .method("GET")
        .uri(probe_uri(base, path))
        .header(header::USER_AGENT, "service-gateway-health-check")
        .body(Body::empty())
    {
        Ok(req) => req,
        Err(e) => return ProbeOutcome::failed(format!("invalid probe request: {e}")),
    };

    match time::timeout(timeout, client.request(request)).await {
        Ok(Ok(response)) => {
            let status = response.status();
            ProbeOutcome {
                status_code: Some(status.as_u16()),
                error: (!status.is_success()).then(|| format!("unexpected status {status}")),
            }
        }
        Ok(Err(e)) => ProbeOutcome::failed(format!("connection error: {e}")),
        Err(_) => ProbeOutcome::failed(format!("probe timed out after {}ms", timeout.as_millis())),
    }
}
