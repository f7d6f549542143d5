//! Relation-fetch requests against a single vertex.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::storage::{Dir, Directionality, Relation};
use crate::types::{GroupId, TypeId, VertexId};

use super::interval::{AttrConstraint, AttributeInterval};
use super::metadata::{TypeCatalog, TypeFacts};

/// Immutable description of which relations of one vertex a caller wants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationQuery {
    vertex: VertexId,
    #[serde(default)]
    direction: Option<Dir>,
    #[serde(default, rename = "type")]
    type_condition: Option<TypeId>,
    #[serde(default, rename = "group")]
    group_condition: Option<GroupId>,
    #[serde(default)]
    constraints: BTreeMap<String, AttrConstraint>,
    #[serde(default)]
    include_hidden: bool,
}

impl RelationQuery {
    /// All visible relations of `vertex`, in both directions.
    pub fn new(vertex: VertexId) -> Self {
        Self {
            vertex,
            direction: None,
            type_condition: None,
            group_condition: None,
            constraints: BTreeMap::new(),
            include_hidden: false,
        }
    }

    /// Restricts the direction.
    pub fn direction(mut self, dir: Dir) -> Self {
        self.direction = Some(dir);
        self
    }

    /// Restricts to one relation type.
    pub fn of_type(mut self, ty: TypeId) -> Self {
        self.type_condition = Some(ty);
        self
    }

    /// Restricts to one type group.
    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group_condition = Some(group);
        self
    }

    /// Constrains attribute `name`.
    pub fn has(mut self, name: impl Into<String>, constraint: impl Into<AttrConstraint>) -> Self {
        self.constraints.insert(name.into(), constraint.into());
        self
    }

    /// Constrains attribute `name` to an interval.
    pub fn interval(self, name: impl Into<String>, interval: AttributeInterval) -> Self {
        self.has(name, AttrConstraint::from_interval(interval))
    }

    /// Includes hidden relations in the answer.
    pub fn with_hidden(mut self) -> Self {
        self.include_hidden = true;
        self
    }

    /// Vertex the query is anchored on.
    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    /// Requested direction, if any.
    pub fn direction_filter(&self) -> Option<Dir> {
        self.direction
    }

    /// Requested type, if any.
    pub fn type_condition(&self) -> Option<TypeId> {
        self.type_condition
    }

    /// Requested group, if any.
    pub fn group_condition(&self) -> Option<GroupId> {
        self.group_condition
    }

    /// Attribute constraints keyed by attribute name.
    pub fn constraints(&self) -> &BTreeMap<String, AttrConstraint> {
        &self.constraints
    }

    /// True when at least one attribute is constrained.
    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Whether hidden relations are part of the answer.
    pub fn includes_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Looks up the schema facts the query depends on.
    ///
    /// Fails fast with [`GraphError::UnknownType`] for an unregistered type and
    /// with [`GraphError::InvalidArgument`] when the type belongs to a group
    /// other than the explicit group condition.
    pub fn resolve<C>(&self, catalog: &C) -> Result<ResolvedQuery<'_>>
    where
        C: TypeCatalog + ?Sized,
    {
        let facts = match self.type_condition {
            Some(ty) => Some(catalog.type_facts(ty)?),
            None => None,
        };
        if let (Some(facts), Some(group)) = (&facts, self.group_condition) {
            if facts.group != group {
                return Err(GraphError::InvalidArgument(format!(
                    "type {} belongs to group {}, not {}",
                    facts.id, facts.group, group
                )));
            }
        }
        let group = facts.as_ref().map(|f| f.group).or(self.group_condition);
        Ok(ResolvedQuery {
            query: self,
            facts,
            group,
        })
    }
}

/// Narrowest schema scope a query addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Every type.
    All,
    /// Every type of one group.
    Group {
        /// The group.
        group: GroupId,
    },
    /// One type; the type condition takes precedence over any group condition.
    Type {
        /// The type.
        ty: TypeId,
        /// Group of the type.
        group: GroupId,
    },
}

/// A [`RelationQuery`] together with the schema facts of its type condition.
#[derive(Clone, Debug)]
pub struct ResolvedQuery<'a> {
    query: &'a RelationQuery,
    facts: Option<Arc<TypeFacts>>,
    group: Option<GroupId>,
}

impl<'a> ResolvedQuery<'a> {
    /// Underlying query.
    pub fn query(&self) -> &'a RelationQuery {
        self.query
    }

    /// Facts of the type condition.
    pub fn facts(&self) -> Option<&TypeFacts> {
        self.facts.as_deref()
    }

    /// Operative group: the type's group, else the explicit group condition.
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Requested direction; an unfiltered query asks for both.
    pub fn direction(&self) -> Dir {
        self.query.direction.unwrap_or(Dir::Both)
    }

    /// Narrowest scope the query addresses.
    pub fn scope(&self) -> Scope {
        match (&self.facts, self.group) {
            (Some(facts), _) => Scope::Type {
                ty: facts.id,
                group: facts.group,
            },
            (None, Some(group)) => Scope::Group { group },
            (None, None) => Scope::All,
        }
    }

    /// True when a type or group condition is present.
    pub fn has_scope(&self) -> bool {
        self.group.is_some()
    }

    /// Attribute constraints.
    pub fn constraints(&self) -> &'a BTreeMap<String, AttrConstraint> {
        &self.query.constraints
    }

    /// Checks direction, type/group and visibility of `relation`.
    ///
    /// Undirected edges satisfy every requested direction at both endpoints.
    pub fn matches_scope<C>(&self, relation: &Relation, catalog: &C) -> Result<bool>
    where
        C: TypeCatalog + ?Sized,
    {
        if relation.hidden() && !self.query.include_hidden {
            return Ok(false);
        }
        let seen = relation.direction(self.query.vertex)?;
        let undirected = relation
            .as_binary()
            .is_some_and(|edge| edge.directionality() == Directionality::Undirected);
        if !undirected && !seen.satisfies(self.direction()) {
            return Ok(false);
        }
        match self.scope() {
            Scope::All => Ok(true),
            Scope::Type { ty, .. } => Ok(relation.ty() == ty),
            Scope::Group { group } => Ok(catalog.type_facts(relation.ty())?.group == group),
        }
    }

    /// Checks every attribute constraint; a missing attribute never matches.
    pub fn satisfies_constraints(&self, relation: &Relation) -> bool {
        self.query
            .constraints
            .iter()
            .all(|(name, c)| relation.attribute(name).is_some_and(|v| c.matches(v)))
    }

    /// Full in-memory filter: scope plus constraints.
    pub fn matches<C>(&self, relation: &Relation, catalog: &C) -> Result<bool>
    where
        C: TypeCatalog + ?Sized,
    {
        Ok(self.matches_scope(relation, catalog)? && self.satisfies_constraints(relation))
    }
}
