//! A small HTTP service with controllable latency and status codes, used
//! to exercise the probe locally.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Upper bound on `/delay/:ms`.
pub const MAX_DELAY_MS: u64 = 60_000;

#[derive(Clone)]
struct AppState {
    start_time: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: u64,
}

impl HealthStatus {
    pub fn healthy(uptime_seconds: u64) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now(),
            uptime_seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DelayParams {
    /// Extra random delay in `0..=jitter` milliseconds.
    jitter: Option<u64>,
}

pub fn router() -> Router {
    let state = AppState {
        start_time: Instant::now(),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/delay/:ms", get(delay))
        .route("/status/:code", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "ok"
}

async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus::healthy(state.start_time.elapsed().as_secs()))
}

async fn delay(Path(ms): Path<u64>, Query(params): Query<DelayParams>) -> impl IntoResponse {
    let jitter = match params.jitter {
        Some(max) if max > 0 => rand::thread_rng().gen_range(0..=max),
        _ => 0,
    };
    let total = ms.saturating_add(jitter).min(MAX_DELAY_MS);
    debug!(delay_ms = total, "Delaying response");

    tokio::time::sleep(Duration::from_millis(total)).await;
    format!("delayed {} ms", total)
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {}", code)),
        Err(_) => (StatusCode::BAD_REQUEST, format!("invalid status code {}", code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_root_is_fast() {
        let (status, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_delay_waits() {
        let start = Instant::now();
        let (status, body) = get("/delay/50").await;
        assert_eq!(status, StatusCode::OK);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(body, "delayed 50 ms");
    }

    #[tokio::test]
    async fn test_delay_with_jitter_stays_in_range() {
        let (status, body) = get("/delay/10?jitter=20").await;
        assert_eq!(status, StatusCode::OK);
        let ms: u64 = body
            .trim_start_matches("delayed ")
            .trim_end_matches(" ms")
            .parse()
            .unwrap();
        assert!((10..=30).contains(&ms));
    }

    #[tokio::test]
    async fn test_status_codes() {
        let (status, _) = get("/status/503").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = get("/status/42").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthStatus = serde_json::from_str(&body).unwrap();
        assert_eq!(health.status, "healthy");
    }
}
