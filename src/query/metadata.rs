//! Schema facts about relation types.
//!
//! The coverage analyzer and the loading cache only need a handful of facts
//! per type: its group, the attribute order of its composite index key, and
//! the hidden/functional flags. [`TypeCatalog`] is the seam to whatever
//! schema registry the surrounding engine keeps.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::storage::Directionality;
use crate::types::{GroupId, TypeId};

/// Whether a type describes edges between two vertices or properties on one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Binary relation between two vertices.
    #[default]
    Edge,
    /// Value attached to a single vertex.
    Property,
}

/// Read-only schema facts for one relation type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFacts {
    /// Type identifier.
    pub id: TypeId,
    /// Human-readable type name.
    pub name: String,
    /// Edge or property.
    #[serde(default)]
    pub kind: RelationKind,
    /// Group the type belongs to.
    pub group: GroupId,
    /// Attribute names in the order the storage index sorts composite keys.
    #[serde(default)]
    pub key_signature: Vec<String>,
    /// Hidden types are skipped unless a query asks for them.
    #[serde(default)]
    pub hidden: bool,
    /// At most one relation of a functional type exists per vertex.
    #[serde(default)]
    pub functional: bool,
    /// Endpoint semantics for edge types.
    #[serde(default)]
    pub directionality: Directionality,
}

impl TypeFacts {
    /// Facts for a visible, non-functional, directed edge type without key attributes.
    pub fn edge(id: TypeId, name: impl Into<String>, group: GroupId) -> Self {
        Self {
            id,
            name: name.into(),
            kind: RelationKind::Edge,
            group,
            key_signature: Vec::new(),
            hidden: false,
            functional: false,
            directionality: Directionality::Directed,
        }
    }

    /// Facts for a visible, non-functional property type.
    pub fn property(id: TypeId, name: impl Into<String>, group: GroupId) -> Self {
        Self {
            kind: RelationKind::Property,
            ..Self::edge(id, name, group)
        }
    }

    /// Sets the composite key signature.
    pub fn key_signature<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_signature = attrs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the endpoint semantics.
    pub fn directionality(mut self, directionality: Directionality) -> Self {
        self.directionality = directionality;
        self
    }

    /// Marks the type hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Marks the type functional.
    pub fn functional(mut self) -> Self {
        self.functional = true;
        self
    }

    /// First attribute of the key signature, if any.
    pub fn first_key(&self) -> Option<&str> {
        self.key_signature.first().map(String::as_str)
    }
}

/// Resolves type identifiers to their schema facts.
pub trait TypeCatalog: Send + Sync {
    /// Returns the facts for `ty`, failing with [`GraphError::UnknownType`].
    fn type_facts(&self, ty: TypeId) -> Result<Arc<TypeFacts>>;
    /// Resolves a type name to its identifier.
    fn resolve_type(&self, name: &str) -> Result<TypeId>;
}

/// Catalog held entirely in memory; used by configuration files and tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    types: FxHashMap<TypeId, Arc<TypeFacts>>,
    names: FxHashMap<String, TypeId>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `facts`, replacing any type with the same id.
    pub fn with_type(mut self, facts: TypeFacts) -> Self {
        self.insert(facts);
        self
    }

    /// Registers `facts` in place; a replaced type's old name stops resolving.
    pub fn insert(&mut self, facts: TypeFacts) {
        if let Some(previous) = self.types.get(&facts.id) {
            if self.names.get(&previous.name) == Some(&facts.id) {
                self.names.remove(&previous.name);
            }
        }
        self.names.insert(facts.name.clone(), facts.id);
        self.types.insert(facts.id, Arc::new(facts));
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeCatalog for InMemoryCatalog {
    fn type_facts(&self, ty: TypeId) -> Result<Arc<TypeFacts>> {
        self.types
            .get(&ty)
            .cloned()
            .ok_or(GraphError::UnknownType(ty))
    }

    fn resolve_type(&self, name: &str) -> Result<TypeId> {
        self.names
            .get(name)
            .copied()
            .or_else(|| {
                name.parse::<u32>()
                    .ok()
                    .map(TypeId)
                    .filter(|id| self.types.contains_key(id))
            })
            .ok_or_else(|| GraphError::UnknownTypeName(name.to_owned()))
    }
}
