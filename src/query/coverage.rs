//! Decides whether the storage index alone answers a query's constraints.
//!
//! Composite keys are sorted by the type's key signature, so an index scan
//! can consume a contiguous prefix of the signature: equality constraints
//! extend the prefix, the first range constraint ends it, and a range with
//! holes cannot be scanned contiguously at all. Every constraint outside the
//! consumed prefix has to be re-checked in memory.

use serde::Serialize;
use tracing::trace;

use crate::error::{GraphError, Result};

use super::descriptor::ResolvedQuery;

/// Outcome of the coverage analysis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Coverage {
    /// True when the index scan returns exactly the matching relations.
    pub exact: bool,
    /// Number of leading key-signature attributes the scan may use.
    pub prefix_len: usize,
}

/// Walks the key signature and counts the constraints an index scan consumes.
pub fn analyze(query: &ResolvedQuery<'_>) -> Result<Coverage> {
    let constraints = query.constraints();
    if constraints.is_empty() {
        return Ok(Coverage {
            exact: true,
            prefix_len: 0,
        });
    }
    // group-only scopes have no single key signature to anchor on
    let Some(facts) = query.facts() else {
        return Ok(Coverage {
            exact: false,
            prefix_len: 0,
        });
    };
    let mut consumed = 0usize;
    for key in &facts.key_signature {
        let Some(constraint) = constraints.get(key) else {
            break;
        };
        if constraint.has_holes() && !constraint.is_range() {
            return Err(GraphError::invariant(format!(
                "constraint on '{key}' carries holes without a range"
            )));
        }
        consumed += 1;
        if constraint.is_range() {
            if constraint.has_holes() {
                consumed -= 1;
            }
            break;
        }
    }
    if consumed > constraints.len() {
        return Err(GraphError::invariant(format!(
            "key prefix of type {} consumed {consumed} of {} constraints",
            facts.id,
            constraints.len()
        )));
    }
    let coverage = Coverage {
        exact: consumed == constraints.len(),
        prefix_len: consumed,
    };
    trace!(
        ty = %facts.id,
        exact = coverage.exact,
        prefix_len = coverage.prefix_len,
        constraints = constraints.len(),
        "relcache.coverage"
    );
    Ok(coverage)
}

/// True when the index alone yields the exact answer.
pub fn is_index_exact(query: &ResolvedQuery<'_>) -> Result<bool> {
    analyze(query).map(|c| c.exact)
}

/// Key-signature attributes the storage scan may bind.
pub fn usable_key_prefix<'q>(query: &'q ResolvedQuery<'_>) -> Result<&'q [String]> {
    let coverage = analyze(query)?;
    Ok(match query.facts() {
        Some(facts) => &facts.key_signature[..coverage.prefix_len],
        None => &[],
    })
}

/// True when the query constrains the first attribute of its type's key signature.
///
/// Such a fetch is a keyed sub-range of the type, never a full scan of it.
pub fn has_key_prefix_constraint(query: &ResolvedQuery<'_>) -> bool {
    query
        .facts()
        .and_then(|facts| facts.first_key())
        .is_some_and(|key| query.constraints().contains_key(key))
}
