//! Route definitions for the REST API.

mod health;
mod maintenance;
mod memories;
mod search;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Capture and retrieval
        .route("/memories", post(memories::add_memory))
        .route("/memories/:id", get(memories::get_memory))
        .route("/decisions/:item_id", get(memories::get_decision))
        // Search and intuition
        .route("/search", post(search::search_memories))
        .route("/gut-feeling", post(search::gut_feeling))
        // Maintenance
        .route("/decay", post(maintenance::trigger_decay))
        .route("/patterns/refresh", post(maintenance::refresh_patterns))
        .route("/status", get(maintenance::status))
        // Attach state
        .with_state(state)
}

pub use health::*;
pub use maintenance::*;
pub use memories::*;
pub use search::*;
