//! Shared state handed to every handler.

use std::sync::Arc;

use remit_rates::{Orchestrator, RateStore, RatesError, RatesResult};

use crate::config::RateLimit;

/// The orchestrator and the store, shared across requests.
pub struct AppState {
    pub orchestrator: Orchestrator,
    store: Arc<RateStore>,
    pub rate_limit: RateLimit,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, store: RateStore) -> Self {
        Self {
            orchestrator,
            store: Arc::new(store),
            rate_limit: RateLimit::default(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Run a store operation off the async runtime.
    pub async fn with_store<T, F>(&self, op: F) -> RatesResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RateStore) -> RatesResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| RatesError::Task(format!("store task failed: {e}")))?
    }
}

pub type SharedState = Arc<AppState>;
