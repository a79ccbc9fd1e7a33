//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use apothecary_augment::RecommendationOrchestrator;
use apothecary_core::config::ApothecaryConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The served
/// index lives inside the orchestrator and is swapped atomically there.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RecommendationOrchestrator>,
    pub config: Arc<ApothecaryConfig>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<RecommendationOrchestrator>, config: ApothecaryConfig) -> Self {
        Self {
            orchestrator,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
