use std::sync::Arc;

use crate::storage::{default_metrics, RelationMetrics};

/// Options supplied when opening a [`super::RelationTx`].
#[derive(Clone)]
pub struct TxOptions {
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn RelationMetrics>>,
    /// Whether completed fetches are recorded and reused.
    pub loading_cache: bool,
    /// Whether relations returned by an index-exact fetch are re-checked
    /// against the query constraints.
    pub verify_exact_fetches: bool,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TxOptions {
    /// Creates options with the loading cache and exact-fetch verification on.
    pub fn new() -> Self {
        Self {
            metrics: None,
            loading_cache: true,
            verify_exact_fetches: true,
        }
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn RelationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables or disables the loading cache.
    pub fn loading_cache(mut self, enabled: bool) -> Self {
        self.loading_cache = enabled;
        self
    }

    /// Enables or disables verification of index-exact fetches.
    pub fn verify_exact_fetches(mut self, enabled: bool) -> Self {
        self.verify_exact_fetches = enabled;
        self
    }

    pub(crate) fn metrics_or_default(&self) -> Arc<dyn RelationMetrics> {
        self.metrics.clone().unwrap_or_else(default_metrics)
    }
}

impl std::fmt::Debug for TxOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxOptions")
            .field("metrics", &self.metrics.is_some())
            .field("loading_cache", &self.loading_cache)
            .field("verify_exact_fetches", &self.verify_exact_fetches)
            .finish()
    }
}
