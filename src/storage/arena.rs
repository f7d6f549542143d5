use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::query::{RelationKind, TypeFacts, Value};
use crate::types::{RelationId, VertexId};

use super::metrics::{default_metrics, RelationMetrics};
use super::relation::{BinaryRelation, PropertyRelation, Relation};

/// First identifier handed out to relations created inside a transaction.
///
/// Persisted relations keep the ids storage assigned them, which stay below
/// this value.
pub const LOCAL_ID_BASE: u64 = 1 << 63;

type Adjacency = SmallVec<[RelationId; 4]>;

/// Owner of every relation materialized in a transaction.
///
/// Vertices are represented only by their adjacency lists of relation ids;
/// relations refer to vertices by id. Removing a relation therefore means
/// dropping it here and detaching its id from each holding vertex.
pub struct RelationArena {
    relations: FxHashMap<RelationId, Relation>,
    adjacency: FxHashMap<VertexId, Adjacency>,
    next_local: u64,
    metrics: Arc<dyn RelationMetrics>,
}

impl Default for RelationArena {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationArena {
    /// Creates an empty arena that discards metrics.
    pub fn new() -> Self {
        Self::with_metrics(default_metrics())
    }

    /// Creates an empty arena reporting to `metrics`.
    pub fn with_metrics(metrics: Arc<dyn RelationMetrics>) -> Self {
        Self {
            relations: FxHashMap::default(),
            adjacency: FxHashMap::default(),
            next_local: LOCAL_ID_BASE,
            metrics,
        }
    }

    fn next_local_id(&mut self) -> RelationId {
        let id = RelationId(self.next_local);
        self.next_local += 1;
        id
    }

    /// Creates an edge of type `facts` from `start` to `end`.
    pub fn add_edge<I>(
        &mut self,
        facts: &TypeFacts,
        start: VertexId,
        end: VertexId,
        attrs: I,
    ) -> Result<RelationId>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if facts.kind != RelationKind::Edge {
            return Err(GraphError::InvalidArgument(format!(
                "type '{}' is not an edge type",
                facts.name
            )));
        }
        let id = self.next_local_id();
        let edge = attrs.into_iter().fold(
            BinaryRelation::new(id, facts.id, start, end, facts.directionality)
                .with_hidden(facts.hidden),
            |edge, (name, value)| edge.with_attr(name, value),
        );
        self.insert(Relation::Binary(edge))?;
        Ok(id)
    }

    /// Creates a property of type `facts` on `vertex`.
    pub fn add_property(
        &mut self,
        facts: &TypeFacts,
        vertex: VertexId,
        value: Value,
    ) -> Result<RelationId> {
        if facts.kind != RelationKind::Property {
            return Err(GraphError::InvalidArgument(format!(
                "type '{}' is not a property type",
                facts.name
            )));
        }
        let id = self.next_local_id();
        let prop = PropertyRelation::new(id, facts.id, vertex, value).with_hidden(facts.hidden);
        self.insert(Relation::Property(prop))?;
        Ok(id)
    }

    /// Registers `relation` with each holding vertex.
    ///
    /// Returns `false` without touching anything when the id is already
    /// present, so re-materializing the same storage row is harmless.
    pub fn insert(&mut self, relation: Relation) -> Result<bool> {
        let id = relation.id();
        if self.relations.contains_key(&id) {
            return Ok(false);
        }
        let holders = relation.holders();
        if let Some(vertex) = holders
            .iter()
            .find(|v| self.relation_ids(**v).contains(&id))
        {
            return Err(GraphError::invariant(format!(
                "vertex {vertex} already lists unknown relation {id}"
            )));
        }
        for vertex in holders {
            self.adjacency.entry(vertex).or_default().push(id);
        }
        self.relations.insert(id, relation);
        self.metrics.relation_created();
        Ok(true)
    }

    /// Looks up a relation.
    pub fn get(&self, id: RelationId) -> Result<&Relation> {
        self.relations.get(&id).ok_or(GraphError::NotFound(id))
    }

    /// True when `id` is held by the arena.
    pub fn contains(&self, id: RelationId) -> bool {
        self.relations.contains_key(&id)
    }

    /// Ids of the relations `vertex` holds.
    pub fn relation_ids(&self, vertex: VertexId) -> &[RelationId] {
        self.adjacency
            .get(&vertex)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// Relations `vertex` holds.
    pub fn relations_of(&self, vertex: VertexId) -> impl Iterator<Item = &Relation> + '_ {
        self.relation_ids(vertex)
            .iter()
            .filter_map(move |id| self.relations.get(id))
    }

    /// Removes a relation from the arena and from every holding vertex.
    ///
    /// The start vertex always holds an edge; the end vertex holds it unless
    /// the edge is unidirected.
    pub fn force_delete(&mut self, id: RelationId) -> Result<Relation> {
        let holders = self.get(id)?.holders();
        for vertex in &holders {
            if !self.relation_ids(*vertex).contains(&id) {
                return Err(GraphError::invariant(format!(
                    "relation {id} missing from adjacency of {vertex}"
                )));
            }
        }
        for vertex in &holders {
            if let Some(list) = self.adjacency.get_mut(vertex) {
                list.retain(|held| *held != id);
            }
        }
        let relation = self.relations.remove(&id).ok_or(GraphError::NotFound(id))?;
        self.metrics.relation_deleted();
        debug!(relation = %id, holders = holders.len(), "relcache.arena.force_delete");
        Ok(relation)
    }

    /// Number of relations held.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// True when the arena holds no relation.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
