//! Search and intuition endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use strata_core::types::{Intuition, IntuitionContext, MemoryItem, SearchFilters};

/// Request body for searching memories.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// The search query.
    pub query: String,
    /// Tier, strength, recency and topic filters plus the result limit.
    #[serde(flatten)]
    pub filters: SearchFilters,
}

/// Response for searching memories.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<MemoryItem>,
}

/// Search memories across tiers.
/// POST /search
pub async fn search_memories(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    if request.query.trim().is_empty() {
        return Err(ApiError::validation("query must not be empty"));
    }

    let results = state.router.search(&request.query, &request.filters).await?;
    Ok(Json(SearchResponse { results }))
}

/// Response for an intuition lookup.
#[derive(Debug, Serialize)]
pub struct GutFeelingResponse {
    pub intuition: Option<Intuition>,
}

/// Return the strongest applicable pattern for a context, if any.
/// POST /gut-feeling
pub async fn gut_feeling(
    State(state): State<AppState>,
    Json(context): Json<IntuitionContext>,
) -> ApiResult<Json<GutFeelingResponse>> {
    Ok(Json(GutFeelingResponse {
        intuition: state.router.gut_feeling(&context),
    }))
}
