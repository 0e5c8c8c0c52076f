//! Capture and retrieval endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use strata_core::types::{MemoryItem, RoutingDecision, Signals};

/// Request body for adding a memory.
#[derive(Debug, Deserialize)]
pub struct AddMemoryRequest {
    /// The content to capture.
    pub content: String,
    /// Signals describing the content; omitted fields are neutral.
    #[serde(default)]
    pub signals: Signals,
    /// Optional explicit topic (derived from the content otherwise).
    pub topic: Option<String>,
    /// Optional caller-supplied embedding.
    pub embedding: Option<Vec<f32>>,
}

/// Response for adding a memory.
#[derive(Debug, Serialize)]
pub struct AddMemoryResponse {
    pub id: String,
    pub decision: RoutingDecision,
}

/// Add a memory.
/// POST /memories
pub async fn add_memory(
    State(state): State<AppState>,
    Json(request): Json<AddMemoryRequest>,
) -> ApiResult<(StatusCode, Json<AddMemoryResponse>)> {
    let mut item = MemoryItem::new(request.content, request.signals);
    if let Some(topic) = request.topic {
        item = item.with_topic(topic);
    }
    if let Some(embedding) = request.embedding {
        item = item.with_embedding(embedding);
    }

    let decision = state.router.add_item(item).await?;

    Ok((
        StatusCode::CREATED,
        Json(AddMemoryResponse {
            id: decision.item_id.clone(),
            decision,
        }),
    ))
}

/// Get a memory by ID. Counts as an access.
/// GET /memories/:id
pub async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MemoryItem>> {
    let item = state.router.get(&id)?;
    Ok(Json(item))
}

/// Get the routing decision recorded for an item.
/// GET /decisions/:item_id
pub async fn get_decision(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> ApiResult<Json<RoutingDecision>> {
    state
        .router
        .decision_for(&item_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No routing decision for '{}'", item_id)))
}
