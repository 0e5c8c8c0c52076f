//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub decay_running: bool,
    pub shutting_down: bool,
    pub version: String,
}

/// Health check endpoint.
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let status = state.router.status()?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        decay_running: status.decay_running,
        shutting_down: state.router.is_shut_down(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
