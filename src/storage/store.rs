//! Seam to the persistent relation store.
//!
//! The transaction layer only calls [`RelationStore::fetch`] after the
//! loading status reported a miss, and hands over the coverage analysis so
//! the store knows how much of the key signature it may bind in its index
//! scan. When the coverage is inexact the store returns a superset and the
//! caller filters it in memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::query::{Coverage, RelationKind, ResolvedQuery, Scope, TypeCatalog, TypeFacts, Value};
use crate::types::{RelationId, TypeId, VertexId};

use super::adjacency::Dir;
use super::codec::CodecRegistry;
use super::relation::{BinaryRelation, Directionality, PropertyRelation, Relation};

/// A fetch the transaction asks storage to run.
#[derive(Clone, Copy, Debug)]
pub struct FetchRequest<'a> {
    /// The query being answered.
    pub query: &'a ResolvedQuery<'a>,
    /// How much of the key signature the index scan may bind.
    pub coverage: Coverage,
}

/// A relation row as storage returns it, attribute values still encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredRelation {
    /// Persisted edge.
    Edge {
        /// Relation identifier.
        id: RelationId,
        /// Edge type.
        ty: TypeId,
        /// Start vertex.
        start: VertexId,
        /// End vertex.
        end: VertexId,
        /// Encoded attribute values.
        attrs: Vec<(String, Vec<u8>)>,
    },
    /// Persisted property.
    Property {
        /// Relation identifier.
        id: RelationId,
        /// Property type.
        ty: TypeId,
        /// Owning vertex.
        vertex: VertexId,
        /// Encoded value.
        value: Vec<u8>,
    },
}

impl StoredRelation {
    /// Relation identifier.
    pub fn id(&self) -> RelationId {
        match self {
            StoredRelation::Edge { id, .. } | StoredRelation::Property { id, .. } => *id,
        }
    }

    /// Relation type.
    pub fn ty(&self) -> TypeId {
        match self {
            StoredRelation::Edge { ty, .. } | StoredRelation::Property { ty, .. } => *ty,
        }
    }

    /// Whether the row, seen from `vertex`, answers a fetch for `requested`.
    ///
    /// Rows of undirected edge types satisfy every direction at both
    /// endpoints; `None` when the row is not incident on `vertex`.
    pub fn satisfies(&self, vertex: VertexId, requested: Dir, facts: &TypeFacts) -> Option<bool> {
        let seen = self.direction(vertex)?;
        let undirected = matches!(self, StoredRelation::Edge { .. })
            && facts.directionality == Directionality::Undirected;
        Some(undirected || seen.satisfies(requested))
    }

    /// Direction of the row as seen from `vertex`, if incident.
    pub fn direction(&self, vertex: VertexId) -> Option<Dir> {
        match self {
            StoredRelation::Edge { start, end, .. } => match (*start == vertex, *end == vertex) {
                (true, true) => Some(Dir::Both),
                (true, false) => Some(Dir::Out),
                (false, true) => Some(Dir::In),
                (false, false) => None,
            },
            StoredRelation::Property { vertex: owner, .. } => {
                (*owner == vertex).then_some(Dir::Out)
            }
        }
    }

    /// Decodes the row into an in-memory relation of type `facts`.
    pub fn decode(&self, facts: &TypeFacts, codecs: &CodecRegistry) -> Result<Relation> {
        if facts.id != self.ty() {
            return Err(GraphError::invariant(format!(
                "row {} decoded with facts of type {}",
                self.id(),
                facts.id
            )));
        }
        match self {
            StoredRelation::Edge {
                id,
                ty,
                start,
                end,
                attrs,
            } => {
                let mut edge =
                    BinaryRelation::new(*id, *ty, *start, *end, facts.directionality)
                        .with_hidden(facts.hidden);
                for (name, bytes) in attrs {
                    edge = edge.with_attr(name.clone(), codecs.decode(bytes)?);
                }
                Ok(Relation::Binary(edge))
            }
            StoredRelation::Property {
                id,
                ty,
                vertex,
                value,
            } => Ok(Relation::Property(
                PropertyRelation::new(*id, *ty, *vertex, codecs.decode(value)?)
                    .with_hidden(facts.hidden),
            )),
        }
    }
}

/// Persistent relation store consulted on loading-status misses.
pub trait RelationStore: Send + Sync {
    /// Returns the relations of the request's vertex matching its scope and
    /// the constraints on the first `coverage.prefix_len` key attributes.
    ///
    /// Hidden relations are always returned; visibility is filtered by the
    /// caller.
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<StoredRelation>>;
}

/// Relation store held in memory, indexed by vertex.
pub struct MemoryStore {
    catalog: Arc<dyn TypeCatalog>,
    codecs: Arc<CodecRegistry>,
    rows: FxHashMap<RelationId, StoredRelation>,
    by_vertex: FxHashMap<VertexId, Vec<RelationId>>,
    next_id: u64,
    fetches: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new(catalog: Arc<dyn TypeCatalog>, codecs: Arc<CodecRegistry>) -> Self {
        Self {
            catalog,
            codecs,
            rows: FxHashMap::default(),
            by_vertex: FxHashMap::default(),
            next_id: 1,
            fetches: AtomicU64::new(0),
        }
    }

    /// Persists an edge and returns its id.
    pub fn insert_edge<I>(
        &mut self,
        ty: TypeId,
        start: VertexId,
        end: VertexId,
        attrs: I,
    ) -> Result<RelationId>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let facts = self.catalog.type_facts(ty)?;
        if facts.kind != RelationKind::Edge {
            return Err(GraphError::InvalidArgument(format!(
                "type '{}' is not an edge type",
                facts.name
            )));
        }
        let attrs = attrs
            .into_iter()
            .map(|(name, value)| Ok((name, self.codecs.encode(&value)?)))
            .collect::<Result<Vec<_>>>()?;
        let id = self.allocate();
        let mut holders = vec![start];
        if end != start && facts.directionality != Directionality::Unidirected {
            holders.push(end);
        }
        self.store(
            StoredRelation::Edge {
                id,
                ty,
                start,
                end,
                attrs,
            },
            &holders,
        );
        Ok(id)
    }

    /// Persists a property and returns its id.
    pub fn insert_property(&mut self, ty: TypeId, vertex: VertexId, value: Value) -> Result<RelationId> {
        let facts = self.catalog.type_facts(ty)?;
        if facts.kind != RelationKind::Property {
            return Err(GraphError::InvalidArgument(format!(
                "type '{}' is not a property type",
                facts.name
            )));
        }
        let value = self.codecs.encode(&value)?;
        let id = self.allocate();
        self.store(
            StoredRelation::Property {
                id,
                ty,
                vertex,
                value,
            },
            &[vertex],
        );
        Ok(id)
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn allocate(&mut self) -> RelationId {
        let id = RelationId(self.next_id);
        self.next_id += 1;
        id
    }

    fn store(&mut self, row: StoredRelation, holders: &[VertexId]) {
        let id = row.id();
        for vertex in holders {
            self.by_vertex.entry(*vertex).or_default().push(id);
        }
        self.rows.insert(id, row);
    }

    fn in_scope(row: &StoredRelation, facts: &TypeFacts, scope: Scope) -> bool {
        match scope {
            Scope::All => true,
            Scope::Type { ty, .. } => row.ty() == ty,
            Scope::Group { group } => facts.group == group,
        }
    }

    fn matches_prefix(&self, row: &StoredRelation, request: &FetchRequest<'_>) -> Result<bool> {
        let Some(facts) = request.query.facts() else {
            return Ok(true);
        };
        let StoredRelation::Edge { attrs, .. } = row else {
            return Ok(request.coverage.prefix_len == 0);
        };
        let Some(prefix) = facts.key_signature.get(..request.coverage.prefix_len) else {
            return Err(GraphError::invariant(format!(
                "usable prefix of {} exceeds key signature of type {}",
                request.coverage.prefix_len, facts.id
            )));
        };
        for key in prefix {
            let Some(constraint) = request.query.constraints().get(key) else {
                return Err(GraphError::invariant(format!(
                    "usable key prefix names unconstrained attribute '{key}'"
                )));
            };
            let stored = attrs.iter().find(|(name, _)| name == key);
            let matched = match stored {
                Some((_, bytes)) => constraint.matches(&self.codecs.decode(bytes)?),
                None => false,
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl RelationStore for MemoryStore {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<StoredRelation>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let vertex = request.query.query().vertex();
        let dir = request.query.direction();
        let scope = request.query.scope();
        let mut out = Vec::new();
        for id in self.by_vertex.get(&vertex).into_iter().flatten() {
            let Some(row) = self.rows.get(id) else {
                continue;
            };
            let facts = self.catalog.type_facts(row.ty())?;
            if row.satisfies(vertex, dir, &facts) != Some(true)
                || !Self::in_scope(row, &facts, scope)
            {
                continue;
            }
            if self.matches_prefix(row, request)? {
                out.push(row.clone());
            }
        }
        debug!(
            vertex = %vertex,
            dir = %dir,
            prefix_len = request.coverage.prefix_len,
            rows = out.len(),
            "relcache.store.fetch"
        );
        Ok(out)
    }
}
