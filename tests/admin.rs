//! Admin API tests, driven in-process through the router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use service_gateway::admin::{setup_admin_router, AdminState};
use service_gateway::config::{parse_config, GatewayConfig};
use service_gateway::resilience::CircuitState;
use service_gateway::{Gateway, Shutdown};

const KEY: &str = "test-admin-key";

fn gateway() -> Gateway {
    let mut config: GatewayConfig = parse_config(
        r#"
        [[services]]
        name = "user"
        url = "http://127.0.0.1:1"
        path_prefix = "/api/users"

        [[services]]
        name = "order"
        url = "http://127.0.0.1:1"
        path_prefix = "/api/orders"

        [circuit_breaker]
        failure_threshold = 1
        "#,
    )
    .unwrap();
    config.admin.api_key = KEY.to_string();
    Gateway::bootstrap(config, &Shutdown::new()).unwrap()
}

fn router(gateway: &Gateway) -> Router {
    setup_admin_router(AdminState::from_gateway(gateway))
}

fn request(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("Authorization", format!("Bearer {key}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn trip(gateway: &Gateway, service: &str) {
    let breaker = gateway.registry.breaker(service).unwrap();
    let _ = breaker
        .execute(|| async { Err::<(), String>("down".into()) })
        .await;
    assert_eq!(breaker.snapshot().state, CircuitState::Open);
}

#[tokio::test]
async fn test_requires_api_key() {
    let gateway = gateway();

    let res = router(&gateway)
        .oneshot(request("GET", "/admin/breakers", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = router(&gateway)
        .oneshot(request("GET", "/admin/breakers", Some("wrong")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_lists_breakers() {
    let gateway = gateway();
    trip(&gateway, "order").await;

    let res = router(&gateway)
        .oneshot(request("GET", "/admin/breakers", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = json(res).await;
    assert_eq!(body["user"]["state"], "CLOSED");
    assert_eq!(body["order"]["state"], "OPEN");
    assert_eq!(body["order"]["metrics"]["failedRequests"], 1);
}

#[tokio::test]
async fn test_status_lists_open_breakers() {
    let gateway = gateway();
    trip(&gateway, "user").await;

    let res = router(&gateway)
        .oneshot(request("GET", "/admin/status", Some(KEY)))
        .await
        .unwrap();
    let body = json(res).await;

    assert_eq!(body["status"], "operational");
    assert_eq!(body["breakers"], 2);
    assert_eq!(body["openBreakers"], serde_json::json!(["user"]));
}

#[tokio::test]
async fn test_reset_one_breaker() {
    let gateway = gateway();
    trip(&gateway, "user").await;

    let res = router(&gateway)
        .oneshot(request("POST", "/admin/breakers/user/reset", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await["reset"], serde_json::json!(["user"]));

    let snap = gateway.registry.breaker("user").unwrap().snapshot();
    assert_eq!(snap.state, CircuitState::Closed);
    assert_eq!(snap.metrics.failed_requests, 1);
}

#[tokio::test]
async fn test_reset_unknown_breaker_is_404() {
    let gateway = gateway();

    let res = router(&gateway)
        .oneshot(request("POST", "/admin/breakers/billing/reset", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json(res).await["message"],
        "no circuit breaker registered for backend billing"
    );
}

#[tokio::test]
async fn test_reset_all_breakers() {
    let gateway = gateway();
    trip(&gateway, "user").await;
    trip(&gateway, "order").await;

    let res = router(&gateway)
        .oneshot(request("POST", "/admin/breakers/reset", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(json(res).await["reset"], serde_json::json!(["order", "user"]));

    assert!(gateway
        .registry
        .all_states()
        .values()
        .all(|s| s.state == CircuitState::Closed));
}
