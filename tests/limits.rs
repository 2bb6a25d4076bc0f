//! Rate limiting and request size limits at the gateway edge.

use serde_json::Value;

mod common;

#[tokio::test]
async fn test_rate_limit_rejects_with_json_body() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = common::base_config();
    config.rate_limit.enabled = true;
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_secs = 900;
    config.services.push(common::service("user", &backend, "/api/users"));
    let gateway = common::start_gateway(config).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client.get(gateway.url("/api/users")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    let res = client
        .get(gateway.url("/api/users"))
        .header("x-request-id", "limited-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["x-request-id"], "limited-1");
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((449..=451).contains(&retry_after), "retry-after {retry_after}");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["message"], "Too many requests from this IP, please try again later.");

    // The health endpoint shares the budget.
    let res = client.get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 429);

    assert_eq!(backend.calls(), 2);
    let snap = gateway.registry.breaker("user").unwrap().snapshot();
    assert_eq!(snap.metrics.total_requests, 2);
}

#[tokio::test]
async fn test_oversized_body_rejected_before_dispatch() {
    let backend = common::start_mock_backend("created").await;

    let mut config = common::base_config();
    config.limits.max_body_size = 16;
    config.services.push(common::service("order", &backend, "/api/orders"));
    let gateway = common::start_gateway(config).await;
    let client = common::client();

    let res = client
        .post(gateway.url("/api/orders"))
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert_eq!(backend.calls(), 0);

    let res = client
        .post(gateway.url("/api/orders"))
        .body("{\"id\":1}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "created");

    let snap = gateway.registry.breaker("order").unwrap().snapshot();
    assert_eq!(snap.metrics.total_requests, 1);
    assert_eq!(snap.metrics.failed_requests, 0);
}
