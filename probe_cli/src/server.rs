use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use probe_metrics::{MetricRegistry, PrometheusExporter};
use serde_json::json;
use std::time::Instant;
use tracing::error;

#[derive(Clone)]
struct AppState {
    registry: MetricRegistry,
    start_time: Instant,
}

pub fn router(registry: MetricRegistry) -> Router {
    let state = AppState {
        registry,
        start_time: Instant::now(),
    };

    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match PrometheusExporter::format(&state.registry.snapshot()) {
        Ok(body) => ([(header::CONTENT_TYPE, PrometheusExporter::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_text_format() {
        let registry = MetricRegistry::new();
        let gauge = registry
            .register_gauge("request_timer", "Total request time", &["method", "url"])
            .unwrap();
        gauge.set(&["GET", "http://a.test"], 0.25).unwrap();

        let (status, content_type, body) = get_body(router(registry), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/plain; version=0.0.4"));
        assert!(body.contains("# TYPE request_timer gauge"));
        assert!(body.contains(r#"request_timer{method="GET",url="http://a.test"} 0.25"#));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, _, body) = get_body(router(MetricRegistry::new()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _, _) = get_body(router(MetricRegistry::new()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
