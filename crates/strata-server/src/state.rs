//! Server state management.

use std::sync::Arc;

use strata_core::config::EngineConfig;
use strata_core::error::StrataResult;
use strata_core::router::MemoryRouter;

use crate::factory::create_router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MemoryRouter>,
}

impl AppState {
    /// Wrap an already constructed router.
    pub fn new(router: Arc<MemoryRouter>) -> Self {
        Self { router }
    }

    /// Build the router, and its providers, from configuration.
    pub fn from_config(config: EngineConfig) -> StrataResult<Self> {
        Ok(Self::new(Arc::new(create_router(config)?)))
    }
}
