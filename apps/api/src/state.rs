use std::sync::Arc;

use crate::analysis::coordinator::AnalysisCoordinator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Built once at startup with the process-lifetime model client and vector index.
    pub coordinator: Arc<AnalysisCoordinator>,
}
