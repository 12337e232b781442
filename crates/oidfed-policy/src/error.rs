//! Error types for metadata policy resolution and merging.

use crate::json::JsonKind;

/// Errors that can occur while merging or applying metadata policy.
///
/// Every variant names the metadata parameter it concerns.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    /// A `value` operator's value has a different JSON kind than the metadata.
    #[error("policy type mismatch for '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: JsonKind,
        found: JsonKind,
    },

    /// Two operators of a variant that only merges on equality differ.
    #[error("cannot merge '{operator}' operators for '{key}': values differ")]
    Unmergeable { key: String, operator: &'static str },

    /// The metadata value is not among the `one_of` values.
    #[error("value of '{key}' is not one of the allowed values")]
    NotAllowed { key: String },

    /// Merging two `one_of` operators left no allowed value.
    #[error("merged 'one_of' for '{key}' allows no value")]
    EmptyIntersection { key: String },

    /// The metadata value lacks values required by `superset_of`.
    #[error("value of '{key}' does not contain every value required by 'superset_of'")]
    NotSuperset { key: String },

    /// An essential parameter has no value.
    #[error("essential parameter '{key}' is missing")]
    MissingEssential { key: String },

    /// Operators combined for one parameter contradict each other.
    #[error("conflicting policy operators for '{key}': {reason}")]
    Conflict { key: String, reason: String },
}

impl PolicyError {
    /// Whether this error came from conflict detection rather than
    /// resolving or merging a single operator.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
