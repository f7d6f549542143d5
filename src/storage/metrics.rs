use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hooks for counting relation-loading activity.
///
/// Implementations must be cheap: every relation fetch reports at least one
/// loading-status lookup.
pub trait RelationMetrics: Send + Sync {
    /// Records a relation added to a transaction arena.
    fn relation_created(&self);

    /// Records a relation force-deleted from a transaction arena.
    fn relation_deleted(&self);

    /// Records a loading-status lookup.
    ///
    /// # Parameters
    /// * `hit` - Whether the relations were already fully materialized.
    fn loading_status(&self, hit: bool);

    /// Records a storage fetch.
    ///
    /// # Parameters
    /// * `direction` - "out", "in", or "both".
    /// * `exact` - Whether the index alone answered the constraints.
    fn store_fetch(&self, direction: &'static str, exact: bool);

    /// Records relations dropped by in-memory constraint filtering.
    fn post_filtered(&self, dropped: usize);
}

/// Discards every recorded metric.
#[derive(Default)]
pub struct NoopMetrics;

impl RelationMetrics for NoopMetrics {
    fn relation_created(&self) {}
    fn relation_deleted(&self) {}
    fn loading_status(&self, _hit: bool) {}
    fn store_fetch(&self, _direction: &'static str, _exact: bool) {}
    fn post_filtered(&self, _dropped: usize) {}
}

/// Atomic counters for every hook.
#[derive(Default)]
pub struct CounterMetrics {
    /// Relations created.
    pub relations_created: AtomicU64,

    /// Relations force-deleted.
    pub relations_deleted: AtomicU64,

    /// Fetches answered by the loading status.
    pub loading_hits: AtomicU64,

    /// Fetches that had to consult storage.
    pub loading_misses: AtomicU64,

    /// Storage fetches for OUT relations.
    pub fetches_out: AtomicU64,

    /// Storage fetches for IN relations.
    pub fetches_in: AtomicU64,

    /// Storage fetches for both directions.
    pub fetches_both: AtomicU64,

    /// Storage fetches whose constraints needed in-memory filtering.
    pub inexact_fetches: AtomicU64,

    /// Relations removed by in-memory filtering.
    pub filtered_out: AtomicU64,
}

impl RelationMetrics for CounterMetrics {
    fn relation_created(&self) {
        self.relations_created.fetch_add(1, Ordering::Relaxed);
    }

    fn relation_deleted(&self) {
        self.relations_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn loading_status(&self, hit: bool) {
        if hit {
            self.loading_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.loading_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn store_fetch(&self, direction: &'static str, exact: bool) {
        match direction {
            "out" => {
                self.fetches_out.fetch_add(1, Ordering::Relaxed);
            }
            "in" => {
                self.fetches_in.fetch_add(1, Ordering::Relaxed);
            }
            "both" => {
                self.fetches_both.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if !exact {
            self.inexact_fetches.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn post_filtered(&self, dropped: usize) {
        self.filtered_out
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation, [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn RelationMetrics> {
    Arc::new(NoopMetrics)
}
