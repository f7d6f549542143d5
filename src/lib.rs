//! Relation-loading cache and query-coverage analysis for a transactional
//! graph layer.
//!
//! The crate answers two questions for every single-vertex relation fetch:
//! whether the relations are already materialized in the transaction
//! ([`storage::LoadingStatus`]) and whether the storage index alone yields an
//! exact answer ([`query::coverage`]).

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod storage;
pub mod tx;
pub mod types;

pub use config::Config;
pub use error::{GraphError, Result};
pub use query::{AttrConstraint, AttributeInterval, RelationQuery, ResolvedQuery, Value};
pub use storage::{Dir, Directionality, LoadingStatus, Relation, RelationArena};
pub use tx::{RelationTx, TxOptions};
pub use types::{GroupId, RelationId, TypeId, VertexId};
