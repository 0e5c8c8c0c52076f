//! Decay, pattern and status endpoints.

use axum::{extract::State, Json};

use crate::error::ApiResult;
use crate::state::AppState;
use strata_core::decay::DecayReport;
use strata_core::patterns::AggregationReport;
use strata_core::router::RouterStatus;

/// Run a decay pass now. Conflicts with a pass already in progress.
/// POST /decay
pub async fn trigger_decay(State(state): State<AppState>) -> ApiResult<Json<DecayReport>> {
    let report = state.router.trigger_decay().await?;
    Ok(Json(report))
}

/// Re-mine patterns now.
/// POST /patterns/refresh
pub async fn refresh_patterns(State(state): State<AppState>) -> ApiResult<Json<AggregationReport>> {
    let report = state.router.refresh_patterns()?;
    Ok(Json(report))
}

/// Tier sizes, utilization and savings.
/// GET /status
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<RouterStatus>> {
    Ok(Json(state.router.status()?))
}
