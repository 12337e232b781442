//! Metadata policy engine.
//!
//! Superior entities in a federation constrain the metadata of their
//! subordinates by publishing a `metadata_policy`: for each entity type and
//! each metadata parameter, a small set of operators. This crate implements
//! that operator algebra:
//!
//! - [`PolicyOperator`]: the seven operators (`value`, `add`, `default`,
//!   `one_of`, `subset_of`, `superset_of`, `essential`) with their fixed
//!   resolution-hierarchy ranks
//! - [`PolicyOperators`]: the operators set for one parameter
//! - [`MetadataPolicy`]: parameter policies per entity type, merged across a
//!   trust chain with [`MetadataPolicy::merge_all`] and applied to a leaf's
//!   metadata with [`MetadataPolicy::apply`]
//!
//! # Merging and conflicts
//!
//! Operators of the same variant from different authorities merge (set
//! intersection for `one_of`/`subset_of`, union for `add`/`superset_of`, OR for
//! `essential`, equality for `value`/`default`). After every merge the
//! operators of a parameter are checked against each other; contradictory
//! combinations fail with [`PolicyError::Conflict`].
//!
//! All value comparisons are structural (see [`json`]).

pub mod error;
pub mod json;
pub mod operator;
pub mod policy;

pub use error::PolicyError;
pub use json::JsonKind;
pub use operator::PolicyOperator;
pub use policy::{MetadataPolicy, ParameterPolicies, PolicyOperators};
