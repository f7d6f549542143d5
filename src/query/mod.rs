#![forbid(unsafe_code)]

//! Query descriptors and the coverage analyzer.
//!
//! A [`RelationQuery`] describes one single-vertex relation fetch. Once
//! resolved against a [`TypeCatalog`] it can be checked against the loading
//! cache and analyzed for index coverage.

/// Index coverage analysis.
///
/// Decides whether the storage index alone answers a query exactly.
pub mod coverage;

/// Query descriptors and their schema resolution.
pub mod descriptor;

/// Attribute intervals with holes and per-attribute constraints.
pub mod interval;

/// Schema facts about relation types.
pub mod metadata;

/// Attribute values.
pub mod value;

pub use coverage::{analyze, has_key_prefix_constraint, is_index_exact, Coverage};
pub use descriptor::{RelationQuery, ResolvedQuery, Scope};
pub use interval::{AttrConstraint, AttributeInterval, Hole};
pub use metadata::{InMemoryCatalog, RelationKind, TypeCatalog, TypeFacts};
pub use value::{Value, ValueKind};
