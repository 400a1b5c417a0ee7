use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use utoipa::ToSchema;

/// Handler state able to reach the database pool
pub trait HealthHandlerState: Clone + Send + Sync + 'static {
    fn db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub database: ComponentHealth,
    pub response_time_ms: u64,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Records process start for the uptime figure.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running")),
    tag = "health"
)]
pub async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness probe; pings the database
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready to serve traffic", body = ReadinessResponse),
        (status = 503, description = "Database unreachable", body = ReadinessResponse)
    ),
    tag = "health"
)]
pub async fn readiness_check<S>(State(state): State<S>) -> impl IntoResponse
where
    S: HealthHandlerState,
{
    let start = Instant::now();
    let db_result = crate::db::check_connection(state.db()).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (code, status, database) = match db_result {
        Ok(()) => (
            StatusCode::OK,
            "ready",
            ComponentHealth {
                status: ComponentStatus::Up,
                latency_ms: Some(latency_ms),
                error: None,
            },
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "not_ready",
            ComponentHealth {
                status: ComponentStatus::Down,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        ),
    };

    (
        code,
        Json(ReadinessResponse {
            status: status.to_string(),
            database,
            response_time_ms: start.elapsed().as_millis() as u64,
        }),
    )
}

/// Health check routes
///
/// - GET /health       - liveness
/// - GET /health/ready - readiness (database ping)
pub fn health_routes<S>() -> Router<S>
where
    S: HealthHandlerState,
{
    Router::new()
        .route("/", get(liveness_check))
        .route("/ready", get(readiness_check::<S>))
}
