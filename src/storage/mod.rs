//! Transaction-local relation storage.
//!
//! Holds the in-memory relation arena, the per-vertex loading status, the
//! value codecs used for persisted attributes and the seam to the persistent
//! store.

/// Direction bitmasks and the [`Dir`] filter.
pub mod adjacency;

/// Arena owning every materialized relation.
pub mod arena;

/// Value codecs for persisted attribute values.
pub mod codec;

/// Per-vertex record of completed fetches.
pub mod loading;

mod metrics;

/// Binary and property relations.
pub mod relation;

/// Persistent store seam and its in-memory implementation.
pub mod store;

pub use adjacency::{covers, mark_dir, Dir, DIR_IN_BIT, DIR_OUT_BIT};
pub use arena::{RelationArena, LOCAL_ID_BASE};
pub use codec::{CodecRegistry, CodecRegistryBuilder, ValueCodec};
pub use loading::LoadingStatus;

/// Metrics hooks.
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, RelationMetrics};

pub use relation::{BinaryRelation, Directionality, PropertyRelation, Relation};
pub use store::{FetchRequest, MemoryStore, RelationStore, StoredRelation};
