//! The seven metadata policy operators.
//!
//! Operators are a closed set. Each carries its operand and knows its rank in
//! the resolution hierarchy, how to resolve a metadata value, how to merge with
//! another operator of the same variant, and which combinations with the other
//! operators of the same parameter are contradictory.

use crate::error::PolicyError;
use crate::json::{self, JsonKind};
use crate::PolicyOperators;
use serde_json::Value;

/// Parameters whose string value is a space-delimited list of tokens.
const SPACE_DELIMITED_PARAMETERS: &[&str] = &["scope"];

/// A single metadata policy operator.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOperator {
    /// Force the parameter to this value; `null` removes it.
    Value(Value),
    /// Add these values to a list parameter.
    Add(Vec<Value>),
    /// Use this value when the parameter is absent.
    Default(Value),
    /// The parameter must be one of these values.
    OneOf(Vec<Value>),
    /// Restrict a list parameter to these values.
    SubsetOf(Vec<Value>),
    /// A list parameter must contain all of these values.
    SupersetOf(Vec<Value>),
    /// The parameter must be present.
    Essential(bool),
}

impl PolicyOperator {
    pub const VALUE_RANK: u8 = 0;
    pub const ADD_RANK: u8 = 5;
    pub const DEFAULT_RANK: u8 = 10;
    pub const ONE_OF_RANK: u8 = 15;
    pub const SUBSET_OF_RANK: u8 = 20;
    pub const SUPERSET_OF_RANK: u8 = 25;
    pub const ESSENTIAL_RANK: u8 = 100;

    /// Position in the resolution hierarchy. Lower ranks apply first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Value(_) => Self::VALUE_RANK,
            Self::Add(_) => Self::ADD_RANK,
            Self::Default(_) => Self::DEFAULT_RANK,
            Self::OneOf(_) => Self::ONE_OF_RANK,
            Self::SubsetOf(_) => Self::SUBSET_OF_RANK,
            Self::SupersetOf(_) => Self::SUPERSET_OF_RANK,
            Self::Essential(_) => Self::ESSENTIAL_RANK,
        }
    }

    /// Operator name as it appears in a `metadata_policy` claim.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Add(_) => "add",
            Self::Default(_) => "default",
            Self::OneOf(_) => "one_of",
            Self::SubsetOf(_) => "subset_of",
            Self::SupersetOf(_) => "superset_of",
            Self::Essential(_) => "essential",
        }
    }

    /// Applies this operator to the current value of parameter `key`.
    ///
    /// `Value::Null` stands for an absent parameter, and a `Value::Null`
    /// result means the parameter is removed.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyError`] matching the violated operator rule.
    pub fn resolve(&self, key: &str, current: Value) -> Result<Value, PolicyError> {
        let tokenized = is_space_delimited(key) && self.is_list_operator();
        if !tokenized {
            return self.resolve_value(key, current);
        }

        let rejoin = matches!(current, Value::String(_) | Value::Null);
        let resolved = self.resolve_value(key, split_tokens(current))?;
        Ok(if rejoin { join_tokens(resolved) } else { resolved })
    }

    fn is_list_operator(&self) -> bool {
        matches!(
            self,
            Self::Add(_) | Self::Default(_) | Self::SubsetOf(_) | Self::SupersetOf(_)
        )
    }

    fn resolve_value(&self, key: &str, current: Value) -> Result<Value, PolicyError> {
        match self {
            Self::Value(value) => {
                if value.is_null() || current.is_null() {
                    return Ok(value.clone());
                }
                let expected = JsonKind::of(value);
                let found = JsonKind::of(&current);
                if expected != found {
                    return Err(PolicyError::TypeMismatch {
                        key: key.to_string(),
                        expected,
                        found,
                    });
                }
                Ok(value.clone())
            }
            Self::Add(values) => match current {
                Value::Null => Ok(Value::Array(json::dedup(values.iter().cloned()))),
                Value::Array(existing) => Ok(Value::Array(json::union(&existing, values))),
                other => Err(PolicyError::TypeMismatch {
                    key: key.to_string(),
                    expected: JsonKind::Array,
                    found: JsonKind::of(&other),
                }),
            },
            Self::Default(value) => {
                if current.is_null() {
                    Ok(value.clone())
                } else {
                    Ok(current)
                }
            }
            Self::Essential(essential) => {
                if *essential && current.is_null() {
                    Err(PolicyError::MissingEssential {
                        key: key.to_string(),
                    })
                } else {
                    Ok(current)
                }
            }
            Self::OneOf(allowed) => {
                if current.is_null() || json::contains(allowed, &current) {
                    Ok(current)
                } else {
                    Err(PolicyError::NotAllowed {
                        key: key.to_string(),
                    })
                }
            }
            Self::SubsetOf(allowed) => match current {
                Value::Null => Ok(Value::Null),
                Value::Array(existing) => Ok(Value::Array(json::intersection(&existing, allowed))),
                other => Err(PolicyError::TypeMismatch {
                    key: key.to_string(),
                    expected: JsonKind::Array,
                    found: JsonKind::of(&other),
                }),
            },
            Self::SupersetOf(required) => match current {
                Value::Null => Ok(Value::Null),
                Value::Array(existing) => {
                    if json::is_subset(required, &existing) {
                        Ok(Value::Array(existing))
                    } else {
                        Err(PolicyError::NotSuperset {
                            key: key.to_string(),
                        })
                    }
                }
                other => Err(PolicyError::TypeMismatch {
                    key: key.to_string(),
                    expected: JsonKind::Array,
                    found: JsonKind::of(&other),
                }),
            },
        }
    }

    /// Merges two operators of the same variant issued by different
    /// authorities for the same parameter.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Unmergeable`] if the operators are of different
    /// variants or are `value`/`default` operators with different values, and
    /// [`PolicyError::EmptyIntersection`] if two `one_of` sets are disjoint.
    pub fn merge(&self, other: &PolicyOperator, key: &str) -> Result<PolicyOperator, PolicyError> {
        let unmergeable = || PolicyError::Unmergeable {
            key: key.to_string(),
            operator: self.name(),
        };

        match (self, other) {
            (Self::Value(a), Self::Value(b)) => {
                if json::json_eq(a, b) {
                    Ok(self.clone())
                } else {
                    Err(unmergeable())
                }
            }
            (Self::Default(a), Self::Default(b)) => {
                if json::json_eq(a, b) {
                    Ok(self.clone())
                } else {
                    Err(unmergeable())
                }
            }
            (Self::Add(a), Self::Add(b)) => Ok(Self::Add(json::union(a, b))),
            (Self::Essential(a), Self::Essential(b)) => Ok(Self::Essential(*a || *b)),
            (Self::OneOf(a), Self::OneOf(b)) => {
                let merged = json::intersection(a, b);
                if merged.is_empty() {
                    Err(PolicyError::EmptyIntersection {
                        key: key.to_string(),
                    })
                } else {
                    Ok(Self::OneOf(merged))
                }
            }
            (Self::SubsetOf(a), Self::SubsetOf(b)) => Ok(Self::SubsetOf(json::intersection(a, b))),
            (Self::SupersetOf(a), Self::SupersetOf(b)) => Ok(Self::SupersetOf(json::union(a, b))),
            _ => Err(unmergeable()),
        }
    }

    /// Checks this operator against the other operators set for the same
    /// parameter.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Conflict`] describing the first violated rule.
    pub fn check_conflicts(&self, key: &str, peers: &PolicyOperators) -> Result<(), PolicyError> {
        let conflict = |reason: &str| {
            Err(PolicyError::Conflict {
                key: key.to_string(),
                reason: reason.to_string(),
            })
        };

        match self {
            Self::Add(added) => {
                if let Some(value) = peers.value() {
                    match as_list(key, value) {
                        Some(list) if json::is_subset(added, &list) => {}
                        _ => return conflict("'add' values are not contained in 'value'"),
                    }
                }
                if peers.one_of().is_some() {
                    return conflict("'add' cannot be combined with 'one_of'");
                }
                if let Some(allowed) = peers.subset_of() {
                    if !json::is_subset(added, allowed) {
                        return conflict("'add' values are not allowed by 'subset_of'");
                    }
                }
            }
            Self::Value(value) => {
                if value.is_null() && peers.default_value().is_some() {
                    return conflict("'value' null cannot be combined with 'default'");
                }
                if value.is_null() && peers.essential() == Some(true) {
                    return conflict("'value' null cannot be combined with essential 'true'");
                }
                if let Some(allowed) = peers.one_of() {
                    if value.is_array() {
                        return conflict("array 'value' cannot be combined with 'one_of'");
                    }
                    if !value.is_null() && !json::contains(allowed, value) {
                        return conflict("'value' is not one of the 'one_of' values");
                    }
                }
                if !value.is_null() {
                    if let Some(allowed) = peers.subset_of() {
                        match as_list(key, value) {
                            Some(list) if json::is_subset(&list, allowed) => {}
                            _ => return conflict("'value' is not a subset of 'subset_of'"),
                        }
                    }
                    if let Some(required) = peers.superset_of() {
                        match as_list(key, value) {
                            Some(list) if json::is_subset(required, &list) => {}
                            _ => return conflict("'value' is not a superset of 'superset_of'"),
                        }
                    }
                }
            }
            Self::OneOf(_) => {
                if peers.subset_of().is_some() {
                    return conflict("'one_of' cannot be combined with 'subset_of'");
                }
                if peers.superset_of().is_some() {
                    return conflict("'one_of' cannot be combined with 'superset_of'");
                }
            }
            Self::SubsetOf(allowed) => {
                if let Some(required) = peers.superset_of() {
                    if !json::is_subset(required, allowed) {
                        return conflict("'superset_of' values are not allowed by 'subset_of'");
                    }
                }
            }
            Self::SupersetOf(required) => {
                if let Some(allowed) = peers.subset_of() {
                    if !json::is_subset(required, allowed) {
                        return conflict("'superset_of' values are not allowed by 'subset_of'");
                    }
                }
            }
            Self::Default(_) | Self::Essential(_) => {}
        }

        Ok(())
    }
}

fn is_space_delimited(key: &str) -> bool {
    SPACE_DELIMITED_PARAMETERS.contains(&key)
}

/// Reads `value` as a list, splitting space-delimited parameters.
fn as_list(key: &str, value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(_) if is_space_delimited(key) => match split_tokens(value.clone()) {
            Value::Array(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn split_tokens(value: Value) -> Value {
    match value {
        Value::String(s) => Value::Array(
            s.split(' ')
                .filter(|t| !t.is_empty())
                .map(|t| Value::String(t.to_string()))
                .collect(),
        ),
        other => other,
    }
}

/// Rejoins tokens into a space-delimited string. No tokens means the
/// parameter is absent.
fn join_tokens(value: Value) -> Value {
    match value {
        Value::Array(items) if items.is_empty() => Value::Null,
        Value::Array(items) if items.iter().all(Value::is_string) => {
            let tokens: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            Value::String(tokens.join(" "))
        }
        other => other,
    }
}
