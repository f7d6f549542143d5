//! Value constraints on a single relation attribute.
//!
//! An [`AttributeInterval`] is a possibly open-ended range over one ordered
//! attribute domain with an optional set of excluded sub-ranges ("holes").
//! Holes matter to the coverage analyzer: an ordered index can answer a
//! contiguous range with one scan, but not a range with gaps.

use std::cmp::Ordering;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

use super::value::Value;

/// Closed sub-range `[low, high]` excluded from an interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hole {
    /// Smallest excluded value.
    pub low: Value,
    /// Largest excluded value.
    pub high: Value,
}

impl Hole {
    fn contains(&self, value: &Value) -> bool {
        !lt(value, &self.low) && !lt(&self.high, value) && comparable(value, &self.low)
    }
}

/// Ordered range over an attribute domain, optionally with holes.
///
/// Holes are kept sorted, pairwise disjoint and strictly inside the bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalRepr", into = "IntervalRepr")]
pub struct AttributeInterval {
    low: Bound<Value>,
    high: Bound<Value>,
    holes: Vec<Hole>,
}

impl AttributeInterval {
    /// Interval containing exactly `value`.
    pub fn point(value: Value) -> Self {
        Self {
            low: Bound::Included(value.clone()),
            high: Bound::Included(value),
            holes: Vec::new(),
        }
    }

    /// Interval between two bounds.
    ///
    /// Fails when the bounds come from different domains or describe an
    /// empty range.
    pub fn range(low: Bound<Value>, high: Bound<Value>) -> Result<Self> {
        if let (Some(l), Some(h)) = (bound_value(&low), bound_value(&high)) {
            match l.compare(h) {
                None => {
                    return Err(GraphError::InvalidArgument(format!(
                        "interval bounds {l} and {h} are not comparable"
                    )))
                }
                Some(Ordering::Greater) => {
                    return Err(GraphError::InvalidArgument(format!(
                        "interval lower bound {l} exceeds upper bound {h}"
                    )))
                }
                Some(Ordering::Equal)
                    if matches!(low, Bound::Excluded(_)) || matches!(high, Bound::Excluded(_)) =>
                {
                    return Err(GraphError::InvalidArgument(format!(
                        "interval around {l} is empty"
                    )))
                }
                _ => {}
            }
        }
        Ok(Self {
            low,
            high,
            holes: Vec::new(),
        })
    }

    /// Values `>= value`.
    pub fn at_least(value: Value) -> Self {
        Self {
            low: Bound::Included(value),
            high: Bound::Unbounded,
            holes: Vec::new(),
        }
    }

    /// Values `> value`.
    pub fn greater_than(value: Value) -> Self {
        Self {
            low: Bound::Excluded(value),
            high: Bound::Unbounded,
            holes: Vec::new(),
        }
    }

    /// Values `<= value`.
    pub fn at_most(value: Value) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Included(value),
            holes: Vec::new(),
        }
    }

    /// Values `< value`.
    pub fn less_than(value: Value) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Excluded(value),
            holes: Vec::new(),
        }
    }

    /// Every value of the domain.
    pub fn unbounded() -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Unbounded,
            holes: Vec::new(),
        }
    }

    /// Excludes the closed sub-range `[low, high]`.
    ///
    /// A point interval has no room for a hole; asking for one is a
    /// bookkeeping defect rather than a caller mistake.
    pub fn with_hole(mut self, low: Value, high: Value) -> Result<Self> {
        if self.is_point() {
            return Err(GraphError::invariant(
                "hole-bearing interval without a range",
            ));
        }
        match low.compare(&high) {
            Some(Ordering::Less | Ordering::Equal) => {}
            Some(Ordering::Greater) => {
                return Err(GraphError::InvalidArgument(format!(
                    "hole lower bound {low} exceeds upper bound {high}"
                )))
            }
            None => {
                return Err(GraphError::InvalidArgument(format!(
                    "hole bounds {low} and {high} are not comparable"
                )))
            }
        }
        let inside_low = match &self.low {
            Bound::Unbounded => true,
            Bound::Included(b) | Bound::Excluded(b) => lt(b, &low),
        };
        let inside_high = match &self.high {
            Bound::Unbounded => true,
            Bound::Included(b) | Bound::Excluded(b) => lt(&high, b),
        };
        if !inside_low || !inside_high {
            return Err(GraphError::InvalidArgument(format!(
                "hole [{low}, {high}] is not strictly inside the interval"
            )));
        }
        if let Some(other) = self
            .holes
            .iter()
            .find(|h| !(lt(&high, &h.low) || lt(&h.high, &low)))
        {
            return Err(GraphError::InvalidArgument(format!(
                "hole [{low}, {high}] overlaps hole [{}, {}]",
                other.low, other.high
            )));
        }
        let at = self
            .holes
            .iter()
            .position(|h| lt(&low, &h.low))
            .unwrap_or(self.holes.len());
        self.holes.insert(at, Hole { low, high });
        Ok(self)
    }

    /// Lower bound.
    pub fn low(&self) -> &Bound<Value> {
        &self.low
    }

    /// Upper bound.
    pub fn high(&self) -> &Bound<Value> {
        &self.high
    }

    /// Excluded sub-ranges in ascending order.
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// True when both bounds are the same inclusive value.
    pub fn is_point(&self) -> bool {
        match (&self.low, &self.high) {
            (Bound::Included(l), Bound::Included(h)) => l.same_as(h),
            _ => false,
        }
    }

    /// True for anything wider than a single value.
    pub fn is_range(&self) -> bool {
        !self.is_point()
    }

    /// True when at least one sub-range is excluded.
    pub fn has_holes(&self) -> bool {
        !self.holes.is_empty()
    }

    /// Tests whether `value` lies in the interval and outside every hole.
    ///
    /// Nulls and values from a different domain are never contained.
    pub fn contains(&self, value: &Value) -> bool {
        if matches!(value, Value::Null) {
            return false;
        }
        let above = match &self.low {
            Bound::Unbounded => true,
            Bound::Included(b) => matches!(b.compare(value), Some(Ordering::Less | Ordering::Equal)),
            Bound::Excluded(b) => lt(b, value),
        };
        let below = match &self.high {
            Bound::Unbounded => true,
            Bound::Included(b) => {
                matches!(value.compare(b), Some(Ordering::Less | Ordering::Equal))
            }
            Bound::Excluded(b) => lt(value, b),
        };
        if !(above && below) {
            return false;
        }
        !self.holes.iter().any(|h| h.contains(value))
    }
}

fn bound_value(bound: &Bound<Value>) -> Option<&Value> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

fn lt(a: &Value, b: &Value) -> bool {
    a.compare(b) == Some(Ordering::Less)
}

fn comparable(a: &Value, b: &Value) -> bool {
    a.compare(b).is_some()
}

#[derive(Serialize, Deserialize)]
struct IntervalRepr {
    low: Bound<Value>,
    high: Bound<Value>,
    #[serde(default)]
    holes: Vec<Hole>,
}

impl TryFrom<IntervalRepr> for AttributeInterval {
    type Error = GraphError;

    fn try_from(repr: IntervalRepr) -> Result<Self> {
        let mut interval = AttributeInterval::range(repr.low, repr.high)?;
        for hole in repr.holes {
            interval = interval.with_hole(hole.low, hole.high)?;
        }
        Ok(interval)
    }
}

impl From<AttributeInterval> for IntervalRepr {
    fn from(interval: AttributeInterval) -> Self {
        IntervalRepr {
            low: interval.low,
            high: interval.high,
            holes: interval.holes,
        }
    }
}

/// Constraint a query places on one attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum AttrConstraint {
    /// The attribute must equal this value.
    Eq(Value),
    /// The attribute must fall inside this interval.
    Interval(AttributeInterval),
}

impl AttrConstraint {
    /// Wraps `interval`, collapsing a hole-free point interval to [`AttrConstraint::Eq`].
    pub fn from_interval(interval: AttributeInterval) -> Self {
        if interval.is_point() && !interval.has_holes() {
            if let Bound::Included(v) = interval.low {
                return AttrConstraint::Eq(v);
            }
        }
        AttrConstraint::Interval(interval)
    }

    /// True for interval constraints wider than one value.
    pub fn is_range(&self) -> bool {
        match self {
            AttrConstraint::Eq(_) => false,
            AttrConstraint::Interval(iv) => iv.is_range(),
        }
    }

    /// True for interval constraints carrying holes.
    pub fn has_holes(&self) -> bool {
        match self {
            AttrConstraint::Eq(_) => false,
            AttrConstraint::Interval(iv) => iv.has_holes(),
        }
    }

    /// Tests a relation attribute against the constraint.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            AttrConstraint::Eq(expected) => expected.same_as(value),
            AttrConstraint::Interval(iv) => iv.contains(value),
        }
    }
}

impl From<Value> for AttrConstraint {
    fn from(value: Value) -> Self {
        AttrConstraint::Eq(value)
    }
}

impl From<AttributeInterval> for AttrConstraint {
    fn from(interval: AttributeInterval) -> Self {
        AttrConstraint::from_interval(interval)
    }
}
