//! Relation model: binary edges and single-vertex properties.
//!
//! Relations never point at vertex objects; they carry [`VertexId`]s and
//! live in a [`super::RelationArena`], which also keeps the per-vertex
//! adjacency lists of relation ids.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::error::{GraphError, Result};
use crate::query::Value;
use crate::types::{RelationId, TypeId, VertexId};

use super::adjacency::Dir;

/// Endpoint semantics of an edge type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directionality {
    /// OUT at the start vertex, IN at the end vertex.
    #[default]
    Directed,
    /// Endpoints are interchangeable.
    Undirected,
    /// Only the start vertex registers the edge.
    Unidirected,
}

/// Edge between exactly two vertices.
///
/// Equality and hashing ignore the relation id and attributes: two edges are
/// equal when their types match and their endpoints match, as an unordered
/// pair for undirected types and as an ordered pair otherwise.
#[derive(Clone, Debug)]
pub struct BinaryRelation {
    id: RelationId,
    ty: TypeId,
    start: VertexId,
    end: VertexId,
    directionality: Directionality,
    hidden: bool,
    attrs: BTreeMap<String, Value>,
}

impl BinaryRelation {
    /// Creates an edge from `start` to `end`.
    pub fn new(
        id: RelationId,
        ty: TypeId,
        start: VertexId,
        end: VertexId,
        directionality: Directionality,
    ) -> Self {
        Self {
            id,
            ty,
            start,
            end,
            directionality,
            hidden: false,
            attrs: BTreeMap::new(),
        }
    }

    /// Sets an attribute value.
    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Sets the hidden flag.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Relation identifier.
    pub fn id(&self) -> RelationId {
        self.id
    }

    /// Relation type.
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Start endpoint.
    pub fn start(&self) -> VertexId {
        self.start
    }

    /// End endpoint.
    pub fn end(&self) -> VertexId {
        self.end
    }

    /// Endpoint semantics.
    pub fn directionality(&self) -> Directionality {
        self.directionality
    }

    /// All attributes.
    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    /// Endpoint at `dir`; `Both` does not name a single endpoint.
    pub fn vertex(&self, dir: Dir) -> Result<VertexId> {
        match dir {
            Dir::Out => Ok(self.start),
            Dir::In => Ok(self.end),
            Dir::Both => Err(GraphError::InvalidArgument(format!(
                "direction {dir} does not select an endpoint of {}",
                self.id
            ))),
        }
    }

    /// Direction of the edge as seen from `vertex`.
    pub fn get_direction(&self, vertex: VertexId) -> Result<Dir> {
        if self.start == vertex {
            if self.end == vertex {
                Ok(Dir::Both)
            } else {
                Ok(Dir::Out)
            }
        } else if self.end == vertex {
            Ok(Dir::In)
        } else {
            Err(self.not_incident(vertex))
        }
    }

    /// The endpoint opposite to `vertex`.
    pub fn get_other_vertex(&self, vertex: VertexId) -> Result<VertexId> {
        if self.start == vertex {
            Ok(self.end)
        } else if self.end == vertex {
            Ok(self.start)
        } else {
            Err(self.not_incident(vertex))
        }
    }

    /// True when `vertex` is either endpoint.
    pub fn is_incident_on(&self, vertex: VertexId) -> bool {
        self.start == vertex || self.end == vertex
    }

    /// True for a loop; with `Some(v)`, only a loop on `v`.
    pub fn is_self_loop(&self, vertex: Option<VertexId>) -> bool {
        if self.start != self.end {
            return false;
        }
        vertex.map_or(true, |v| v == self.start)
    }

    /// Vertices whose adjacency lists hold this edge.
    ///
    /// The end vertex is skipped for unidirected edges and for loops.
    pub fn holders(&self) -> SmallVec<[VertexId; 2]> {
        if self.directionality == Directionality::Unidirected || self.start == self.end {
            smallvec![self.start]
        } else {
            smallvec![self.start, self.end]
        }
    }

    fn not_incident(&self, vertex: VertexId) -> GraphError {
        GraphError::NotIncident {
            relation: self.id,
            vertex,
        }
    }
}

impl PartialEq for BinaryRelation {
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match self.directionality {
            Directionality::Undirected => {
                (self.start == other.start && self.end == other.end)
                    || (self.start == other.end && self.end == other.start)
            }
            Directionality::Directed | Directionality::Unidirected => {
                self.start == other.start && self.end == other.end
            }
        }
    }
}

impl Eq for BinaryRelation {}

impl Hash for BinaryRelation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.directionality {
            // additive so that swapping the endpoints hashes identically
            Directionality::Undirected => self.start.0.wrapping_add(self.end.0).hash(state),
            Directionality::Directed | Directionality::Unidirected => {
                self.start.hash(state);
                self.end.hash(state);
            }
        }
        self.ty.hash(state);
    }
}

impl fmt::Display for BinaryRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.directionality {
            Directionality::Undirected => {
                write!(f, "{} - [{}] - {}", self.start, self.ty, self.end)
            }
            _ => write!(f, "{} - [{}] -> {}", self.start, self.ty, self.end),
        }
    }
}

/// Value attached to one vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRelation {
    id: RelationId,
    ty: TypeId,
    vertex: VertexId,
    value: Value,
    hidden: bool,
}

impl PropertyRelation {
    /// Creates a property of type `ty` on `vertex`.
    pub fn new(id: RelationId, ty: TypeId, vertex: VertexId, value: Value) -> Self {
        Self {
            id,
            ty,
            vertex,
            value,
            hidden: false,
        }
    }

    /// Sets the hidden flag.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Owning vertex.
    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    /// Property value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Any relation the arena can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum Relation {
    /// Edge between two vertices.
    Binary(BinaryRelation),
    /// Property on one vertex.
    Property(PropertyRelation),
}

impl Relation {
    /// Relation identifier.
    pub fn id(&self) -> RelationId {
        match self {
            Relation::Binary(edge) => edge.id,
            Relation::Property(prop) => prop.id,
        }
    }

    /// Relation type.
    pub fn ty(&self) -> TypeId {
        match self {
            Relation::Binary(edge) => edge.ty,
            Relation::Property(prop) => prop.ty,
        }
    }

    /// Number of vertices the relation connects.
    pub fn arity(&self) -> usize {
        match self {
            Relation::Binary(_) => 2,
            Relation::Property(_) => 1,
        }
    }

    /// Whether the relation is hidden from ordinary queries.
    pub fn hidden(&self) -> bool {
        match self {
            Relation::Binary(edge) => edge.hidden,
            Relation::Property(prop) => prop.hidden,
        }
    }

    /// Direction as seen from `vertex`; properties are always OUT of their vertex.
    pub fn direction(&self, vertex: VertexId) -> Result<Dir> {
        match self {
            Relation::Binary(edge) => edge.get_direction(vertex),
            Relation::Property(prop) if prop.vertex == vertex => Ok(Dir::Out),
            Relation::Property(prop) => Err(GraphError::NotIncident {
                relation: prop.id,
                vertex,
            }),
        }
    }

    /// True when `vertex` is an endpoint.
    pub fn is_incident_on(&self, vertex: VertexId) -> bool {
        match self {
            Relation::Binary(edge) => edge.is_incident_on(vertex),
            Relation::Property(prop) => prop.vertex == vertex,
        }
    }

    /// True for an edge loop (optionally on `vertex`).
    pub fn is_self_loop(&self, vertex: Option<VertexId>) -> bool {
        match self {
            Relation::Binary(edge) => edge.is_self_loop(vertex),
            Relation::Property(_) => false,
        }
    }

    /// Attribute used by query constraints; properties carry none.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        match self {
            Relation::Binary(edge) => edge.attrs.get(name),
            Relation::Property(_) => None,
        }
    }

    /// Vertices whose adjacency lists hold the relation.
    pub fn holders(&self) -> SmallVec<[VertexId; 2]> {
        match self {
            Relation::Binary(edge) => edge.holders(),
            Relation::Property(prop) => smallvec![prop.vertex],
        }
    }

    /// The edge, if this is one.
    pub fn as_binary(&self) -> Option<&BinaryRelation> {
        match self {
            Relation::Binary(edge) => Some(edge),
            Relation::Property(_) => None,
        }
    }

    /// The property, if this is one.
    pub fn as_property(&self) -> Option<&PropertyRelation> {
        match self {
            Relation::Binary(_) => None,
            Relation::Property(prop) => Some(prop),
        }
    }
}
