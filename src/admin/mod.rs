//! Authenticated admin API.
//!
//! Served on its own listener so it can stay bound to loopback while the
//! gateway listener is public.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::pipeline::RequestPipeline;

#[derive(Clone)]
pub struct AdminState {
    pub pipeline: Arc<RequestPipeline>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(pipeline: Arc<RequestPipeline>, api_key: &str) -> Router {
    let state = AdminState {
        pipeline,
        api_key: Arc::from(api_key),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route(
            "/admin/backends",
            get(get_backends).post(add_backend).delete(remove_backend),
        )
        .route("/admin/cache", get(get_cache).delete(purge_cache))
        .route("/admin/circuit", get(get_circuit))
        .route("/admin/circuit/reset", post(reset_circuit))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::load_balancer::BackendSelector;
    use crate::pipeline::HttpForwarder;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn router() -> (Router, Arc<RequestPipeline>) {
        let mut config = GatewayConfig::default();
        config.backends = vec!["http://10.0.0.1:80".into(), "http://10.0.0.2:80".into()];
        let selector = Arc::new(BackendSelector::new(&config.backends, Duration::from_secs(30)).unwrap());
        let pipeline = Arc::new(RequestPipeline::from_config(
            &config,
            selector,
            Arc::new(HttpForwarder::new(1024)),
        ));
        (setup_admin_router(pipeline.clone(), KEY), pipeline)
    }

    fn request(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", KEY));
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_token() {
        let (app, _) = router();
        let missing = Request::get("/admin/status").body(Body::empty()).unwrap();
        let res = app.clone().oneshot(missing).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::get("/admin/status")
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(wrong).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_reports_backends_and_circuit() {
        let (app, _) = router();
        let res = app.oneshot(request(Method::GET, "/admin/status", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = json(res).await;
        assert_eq!(body["backends_total"], 2);
        assert_eq!(body["backends_healthy"], 2);
        assert_eq!(body["cache_entries"], 0);
        assert_eq!(body["circuit"]["scope"], "global");
        assert_eq!(body["circuit"]["circuit"]["state"], "closed");
    }

    #[tokio::test]
    async fn add_and_remove_backends() {
        let (app, pipeline) = router();

        let res = app
            .clone()
            .oneshot(request(Method::POST, "/admin/backends", Some(r#"{"address":"10.0.0.3:8080"}"#)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(json(res).await["url"], "http://10.0.0.3:8080");
        assert_eq!(pipeline.selector().len(), 3);

        let res = app
            .clone()
            .oneshot(request(Method::POST, "/admin/backends", Some(r#"{"address":"http://10.0.0.3:8080"}"#)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .clone()
            .oneshot(request(Method::DELETE, "/admin/backends", Some(r#"{"address":"http://10.0.0.1:80"}"#)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = app
            .oneshot(request(Method::DELETE, "/admin/backends", Some(r#"{"address":"http://10.9.9.9:80"}"#)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(pipeline.selector().len(), 2);
    }

    #[tokio::test]
    async fn circuit_reset_closes_global_breaker() {
        let (app, pipeline) = router();
        if let crate::pipeline::CircuitMode::Global(breaker) = pipeline.circuit() {
            breaker.report_failure(std::time::Instant::now());
        }

        let res = app
            .clone()
            .oneshot(request(Method::GET, "/admin/circuit", None))
            .await
            .unwrap();
        assert_eq!(json(res).await["circuit"]["state"], "open");

        let res = app
            .oneshot(request(Method::POST, "/admin/circuit/reset", None))
            .await
            .unwrap();
        assert_eq!(json(res).await["circuit"]["state"], "closed");
    }

    #[tokio::test]
    async fn cache_purge_reports_count() {
        let (app, pipeline) = router();
        let cache = pipeline.cache().unwrap();
        cache.store("/a", "x".into(), StatusCode::OK);
        cache.store("/b", "y".into(), StatusCode::OK);

        let res = app
            .clone()
            .oneshot(request(Method::GET, "/admin/cache", None))
            .await
            .unwrap();
        assert_eq!(json(res).await["entries"], 2);

        let res = app
            .oneshot(request(Method::DELETE, "/admin/cache", None))
            .await
            .unwrap();
        assert_eq!(json(res).await["purged"], 2);
        assert!(cache.is_empty());
    }
}
