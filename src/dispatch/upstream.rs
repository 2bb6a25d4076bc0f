//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Rewrite an incoming request onto a service's base URL
//! - Send it over the shared connection pool
//! - Classify 5xx responses as failures for the circuit breaker

use axum::body::Body;
use axum::http::header::{self, HeaderName};
use axum::http::uri::InvalidUri;
use axum::http::{Request, StatusCode, Uri};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use url::Url;

/// Pooled HTTP/1.1 client shared by the dispatcher and health probes.
pub type HttpClient = Client<HttpConnector, Body>;

const HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    header::HOST,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Errors from a single upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] InvalidUri),

    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream responded with {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: HttpClient,
}

impl UpstreamClient {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    pub fn http(&self) -> &HttpClient {
        &self.client
    }

    /// Rebase `request` onto `base`, keeping method, headers, path, query and body.
    ///
    /// `http://svc:3001/v1` + `/api/users?id=1` → `http://svc:3001/v1/api/users?id=1`
    pub fn prepare(base: &Url, request: Request<Body>) -> Result<Request<Body>, UpstreamError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let uri: Uri = format!(
            "{}{}{}",
            base.origin().ascii_serialization(),
            base.path().trim_end_matches('/'),
            path_and_query
        )
        .parse()?;

        let mut builder = Request::builder().method(parts.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in parts.headers.iter() {
                if !HOP_BY_HOP.contains(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        Ok(builder.body(body)?)
    }

    /// Send a prepared request. Server errors come back as `Err`.
    pub async fn send(&self, request: Request<Body>) -> Result<Response, UpstreamError> {
        let response = self.client.request(request).await?;
        if response.status().is_server_error() {
            return Err(UpstreamError::Status(response.status()));
        }

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}
