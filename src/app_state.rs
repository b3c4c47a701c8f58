//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::LayoutService;
use crate::store::DocumentStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Layout service for all business logic.
    pub layout_service: Arc<LayoutService>,
    /// Document store handle, probed by the health check.
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Wires the service layer on top of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, transaction_max_attempts: u32) -> Self {
        let layouts = crate::store::LayoutStore::new(Arc::clone(&store), transaction_max_attempts);
        Self {
            layout_service: Arc::new(LayoutService::new(layouts)),
            store,
        }
    }
}
