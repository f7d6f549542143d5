//! Error type shared by every layer of the crate.

use std::io;

use thiserror::Error;
use tracing::error;

use crate::types::{RelationId, TypeId, VertexId};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by the loading cache, the coverage analyzer and the
/// relation model.
///
/// None of these are transient: storage I/O failures belong to the storage
/// collaborator and surface through it.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A relation operation addressed a vertex that is not one of its endpoints.
    #[error("relation {relation} is not incident on vertex {vertex}")]
    NotIncident {
        /// The relation that was addressed.
        relation: RelationId,
        /// The vertex that is not an endpoint.
        vertex: VertexId,
    },
    /// The schema does not know the referenced type.
    #[error("unknown relation type {0}")]
    UnknownType(TypeId),
    /// The schema does not know the referenced type name.
    #[error("unknown relation type '{0}'")]
    UnknownTypeName(String),
    /// Internal bookkeeping is inconsistent; the operation is aborted.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// The caller supplied an argument that contradicts the contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The relation is not present in the arena.
    #[error("relation {0} not found")]
    NotFound(RelationId),
    /// A persisted value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
    /// The configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GraphError {
    /// Builds an [`GraphError::InvariantViolation`] and reports it.
    ///
    /// Callers trust the booleans this crate produces without re-checking
    /// them, so every violation is logged at error level before it is
    /// propagated.
    pub fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!(reason = %msg, "relcache.invariant_violation");
        GraphError::InvariantViolation(msg)
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::NotIncident { .. } => "NotIncident",
            GraphError::UnknownType(_) | GraphError::UnknownTypeName(_) => "UnknownType",
            GraphError::InvariantViolation(_) => "InvariantViolation",
            GraphError::InvalidArgument(_) => "InvalidArgument",
            GraphError::NotFound(_) => "NotFound",
            GraphError::Codec(_) => "Codec",
            GraphError::Config(_) => "Config",
            GraphError::Io(_) => "Io",
        }
    }
}
