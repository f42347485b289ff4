//! Shared application state for the Axum API server.

use std::sync::Arc;

use mailflow_notifier::EmailWorker;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<EmailWorker>,
}

impl AppState {
    pub fn new(worker: Arc<EmailWorker>) -> Self {
        Self { worker }
    }
}
