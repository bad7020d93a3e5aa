//! Minimal change-detection primitives.
//!
//! [`Delta`] describes the named field-level differences between two
//! entities of the same kind. For entities that are not simple value
//! types, an empty delta is the canonical definition of equality: their
//! `PartialEq` implementations delegate to [`Differences::compute_differences`].

use serde::Serialize;

/// One field-level difference between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    /// Name of the differing field.
    pub field: &'static str,
    /// Type name of the differing field's values.
    pub value_type: &'static str,
    /// Rendering of the left entity's value.
    pub left: String,
    /// Rendering of the right entity's value.
    pub right: String,
}

/// The complete difference set between two entities.
#[derive(Debug, Clone, Serialize)]
pub struct Delta {
    /// Display name of the left entity.
    pub left: String,
    /// Display name of the right entity.
    pub right: String,
    /// Ordered field-level differences; empty means the entities are equal.
    pub differences: Vec<Difference>,
}

impl Delta {
    /// Starts an empty delta between two named entities.
    #[must_use]
    pub fn between(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            differences: Vec::new(),
        }
    }

    /// Records a difference when the two renderings are not equal.
    pub fn record<T: std::fmt::Display + PartialEq>(
        &mut self,
        field: &'static str,
        value_type: &'static str,
        left: &T,
        right: &T,
    ) {
        if left != right {
            self.differences.push(Difference {
                field,
                value_type,
                left: left.to_string(),
                right: right.to_string(),
            });
        }
    }

    /// True when no differences were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Entities that can describe their differences from a peer.
///
/// `compute_differences` is the canonical equality for the schema model:
/// two entities of the same concrete kind are equal iff their difference
/// set is empty.
pub trait Differences {
    /// Computes the ordered field-level differences against `other`.
    fn compute_differences(&self, other: &Self) -> Delta;
}
