use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use objdb_metrics::Metrics;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

/// Builds the thin external surface this repo stands up: health, readiness,
/// and the Prometheus exposition endpoint. Everything else (REST, Swagger,
/// WebSocket fan-out) lives outside this crate.
pub fn build_app(metrics: Arc<Metrics>, auth_token: Option<String>) -> Router {
    let state = AppState { metrics, auth_token: auth_token.map(Arc::new) };

    Router::new()
        .route("/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use objdb_metrics::Metrics;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn health_is_always_public() {
        let app = build_app(Metrics::new().unwrap(), Some("secret".to_string()));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_without_token_configured_is_public() {
        let app = build_app(Metrics::new().unwrap(), None);
        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_without_bearer_token_is_401_when_configured() {
        let app = build_app(Metrics::new().unwrap(), Some("secret".to_string()));
        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn metrics_with_correct_bearer_token_returns_200() {
        let app = build_app(Metrics::new().unwrap(), Some("secret".to_string()));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .header("Authorization", "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_body_is_prometheus_text_exposition() {
        let app = build_app(Metrics::new().unwrap(), None);
        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap().to_string();
        assert!(content_type.contains("version=0.0.4"));
    }
}
