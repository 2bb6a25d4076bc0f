//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use service_gateway::config::{CircuitBreakerOverrides, GatewayConfig, ServiceConfig};
use service_gateway::resilience::BreakerRegistry;
use service_gateway::{Gateway, HttpServer, Shutdown};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Path and query from the request line.
    pub target: String,
    /// Raw request head, lowercased.
    pub head: String,
}

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests other than health probes.
    pub fn calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| !r.target.starts_with("/health"))
            .count()
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> MockBackend {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend. `f` receives the request target.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        handle(socket, f, log).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, requests }
}

async fn handle<F, Fut>(mut socket: TcpStream, f: Arc<F>, log: Arc<Mutex<Vec<Recorded>>>)
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = (u16, String)>,
{
    let head = match read_head(&mut socket).await {
        Some(head) => head,
        None => return,
    };
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    log.lock().unwrap().push(Recorded {
        target: target.clone(),
        head: head.to_lowercase(),
    });

    let (status, body) = f(target).await;
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf[..end]).into_owned());
        }
    }
}

pub fn service(name: &str, backend: &MockBackend, prefix: &str) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        url: backend.url(),
        path_prefix: Some(prefix.to_string()),
        host: None,
        priority: 0,
        circuit_breaker: CircuitBreakerOverrides::default(),
    }
}

/// Config with background tasks and exporters off.
pub fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.health_check.enabled = false;
    config.observability.metrics_enabled = false;
    config.rate_limit.enabled = false;
    config
}

pub struct RunningGateway {
    pub addr: SocketAddr,
    pub registry: Arc<BreakerRegistry>,
    pub shutdown: Shutdown,
}

impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let shutdown = Shutdown::new();
    let gateway = Gateway::bootstrap(config, &shutdown).unwrap();
    let registry = gateway.registry.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(gateway, shutdown.clone());
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    RunningGateway {
        addr,
        registry,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
