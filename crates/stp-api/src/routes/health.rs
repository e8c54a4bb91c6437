//! # Health Probe
//!
//! `GET /health` answers as long as the process is serving; it does not
//! touch the cache or the engine.

use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Service name reported by the health probe.
pub const SERVICE_NAME: &str = "stp-thumbnail";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    pub service: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /health: Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}
