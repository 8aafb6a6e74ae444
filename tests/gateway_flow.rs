//! End-to-end request flow through the gateway.

use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn cache_serves_second_request() {
    let backend = common::start_mock_backend("cached body").await;
    let gateway = common::start_gateway(common::base_config(&[backend.url()])).await;
    let client = common::client();

    let first = client.get(gateway.url("/items")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(first.text().await.unwrap(), "cached body");

    let second = client.get(gateway.url("/items")).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(second.text().await.unwrap(), "cached body");

    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn sixth_request_is_rate_limited() {
    let backend = common::start_mock_backend("ok").await;
    let gateway = common::start_gateway(common::base_config(&[backend.url()])).await;
    let client = common::client();

    for i in 0..5 {
        let res = client.get(gateway.url(&format!("/r/{}", i))).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(gateway.url("/r/5")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(backend.hits(), 5);
}

#[tokio::test]
async fn requests_rotate_across_backends() {
    let a = common::start_mock_backend("a").await;
    let b = common::start_mock_backend("b").await;
    let c = common::start_mock_backend("c").await;
    let mut config = common::base_config(&[a.url(), b.url(), c.url()]);
    config.rate_limit.max_requests = 20;
    let gateway = common::start_gateway(config).await;
    let client = common::client();

    let mut bodies = Vec::new();
    for i in 0..10 {
        let res = client.get(gateway.url(&format!("/k/{}", i))).send().await.unwrap();
        bodies.push(res.text().await.unwrap());
    }

    assert_eq!(bodies, ["a", "b", "c", "a", "b", "c", "a", "b", "c", "a"]);
    assert_eq!((a.hits(), b.hits(), c.hits()), (4, 3, 3));
}

#[tokio::test]
async fn gateway_health_bypasses_pipeline() {
    let backend = common::start_mock_backend("ok").await;
    let gateway = common::start_gateway(common::base_config(&[backend.url()])).await;
    let client = common::client();

    for _ in 0..10 {
        let res = client.get(gateway.url("/health")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "API Gateway is running");
    }
    for version in ["v1", "v2"] {
        let res = client.get(gateway.url(&format!("/health/{}", version))).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), format!("Health check for {}", version));
    }
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn request_id_and_forwarding_headers() {
    let backend = common::start_mock_backend("ok").await;
    let gateway = common::start_gateway(common::base_config(&[backend.url()])).await;
    let client = common::client();

    let res = client
        .get(gateway.url("/fresh"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "req-123");
    assert_eq!(backend.last_header("x-request-id").as_deref(), Some("req-123"));
    assert_eq!(backend.last_header("x-forwarded-for").as_deref(), Some("127.0.0.1"));

    let res = client.get(gateway.url("/generated")).send().await.unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());
}

#[tokio::test]
async fn not_found_is_not_cached() {
    let backend = common::start_programmable_backend(|_| async { (404, "missing".to_string()) }).await;
    let gateway = common::start_gateway(common::base_config(&[backend.url()])).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client.get(gateway.url("/missing")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn reloaded_backend_list_is_applied() {
    let old = common::start_mock_backend("old").await;
    let new = common::start_mock_backend("new").await;
    let mut config = common::base_config(&[old.url()]);
    config.cache.enabled = false;
    let gateway = common::start_gateway(config.clone()).await;
    let client = common::client();

    let res = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "old");

    config.backends = vec![new.url()];
    gateway.config_updates.send(config).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let res = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "new");
}
