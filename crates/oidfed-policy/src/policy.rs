//! Operator sets per parameter and per entity type, and their application.

use crate::error::PolicyError;
use crate::operator::PolicyOperator;
use oidfed_types::{EntityType, Metadata};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The operators a policy sets for one metadata parameter.
///
/// Holds at most one operator per variant, kept in resolution-hierarchy order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "OperatorsRepr", into = "OperatorsRepr")]
pub struct PolicyOperators(Vec<PolicyOperator>);

impl PolicyOperators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `operator`, replacing and returning any operator of the same
    /// variant.
    pub fn insert(&mut self, operator: PolicyOperator) -> Option<PolicyOperator> {
        let rank = operator.rank();
        match self.0.binary_search_by_key(&rank, PolicyOperator::rank) {
            Ok(pos) => Some(std::mem::replace(&mut self.0[pos], operator)),
            Err(pos) => {
                self.0.insert(pos, operator);
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, operator: PolicyOperator) -> Self {
        self.insert(operator);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolicyOperator> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn by_rank(&self, rank: u8) -> Option<&PolicyOperator> {
        self.0.iter().find(|op| op.rank() == rank)
    }

    pub fn value(&self) -> Option<&Value> {
        match self.by_rank(PolicyOperator::VALUE_RANK) {
            Some(PolicyOperator::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn add(&self) -> Option<&[Value]> {
        match self.by_rank(PolicyOperator::ADD_RANK) {
            Some(PolicyOperator::Add(v)) => Some(v),
            _ => None,
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        match self.by_rank(PolicyOperator::DEFAULT_RANK) {
            Some(PolicyOperator::Default(v)) => Some(v),
            _ => None,
        }
    }

    pub fn one_of(&self) -> Option<&[Value]> {
        match self.by_rank(PolicyOperator::ONE_OF_RANK) {
            Some(PolicyOperator::OneOf(v)) => Some(v),
            _ => None,
        }
    }

    pub fn subset_of(&self) -> Option<&[Value]> {
        match self.by_rank(PolicyOperator::SUBSET_OF_RANK) {
            Some(PolicyOperator::SubsetOf(v)) => Some(v),
            _ => None,
        }
    }

    pub fn superset_of(&self) -> Option<&[Value]> {
        match self.by_rank(PolicyOperator::SUPERSET_OF_RANK) {
            Some(PolicyOperator::SupersetOf(v)) => Some(v),
            _ => None,
        }
    }

    pub fn essential(&self) -> Option<bool> {
        match self.by_rank(PolicyOperator::ESSENTIAL_RANK) {
            Some(PolicyOperator::Essential(v)) => Some(*v),
            _ => None,
        }
    }

    /// Merges operators of `other` into a copy of `self`, variant by variant.
    ///
    /// Does not run conflict detection; see [`check_conflicts`](Self::check_conflicts).
    pub fn merge(&self, other: &PolicyOperators, key: &str) -> Result<PolicyOperators, PolicyError> {
        let mut merged = self.clone();
        for theirs in other.iter() {
            let combined = match merged.by_rank(theirs.rank()) {
                Some(ours) => ours.merge(theirs, key)?,
                None => theirs.clone(),
            };
            merged.insert(combined);
        }
        Ok(merged)
    }

    /// Checks every operator against its peers.
    pub fn check_conflicts(&self, key: &str) -> Result<(), PolicyError> {
        for operator in self.iter() {
            operator.check_conflicts(key, self)?;
        }
        Ok(())
    }

    /// Runs every operator over `current` in resolution-hierarchy order.
    pub fn resolve(&self, key: &str, current: Value) -> Result<Value, PolicyError> {
        self.iter()
            .try_fold(current, |value, operator| operator.resolve(key, value))
    }
}

impl FromIterator<PolicyOperator> for PolicyOperators {
    fn from_iter<T: IntoIterator<Item = PolicyOperator>>(iter: T) -> Self {
        let mut operators = Self::new();
        for operator in iter {
            operators.insert(operator);
        }
        operators
    }
}

/// Wire form of [`PolicyOperators`]: one optional member per operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OperatorsRepr {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    add: Option<Vec<Value>>,
    #[serde(
        rename = "default",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    one_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subset_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    superset_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    essential: Option<bool>,
}

/// Maps a present member to `Some`, including an explicit `null`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Accepts a single value where a list is expected.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Array(items) => Some(items),
        single => Some(vec![single]),
    })
}

impl From<OperatorsRepr> for PolicyOperators {
    fn from(repr: OperatorsRepr) -> Self {
        let mut operators = PolicyOperators::new();
        if let Some(v) = repr.value {
            operators.insert(PolicyOperator::Value(v));
        }
        if let Some(v) = repr.add {
            operators.insert(PolicyOperator::Add(v));
        }
        if let Some(v) = repr.default_value {
            operators.insert(PolicyOperator::Default(v));
        }
        if let Some(v) = repr.one_of {
            operators.insert(PolicyOperator::OneOf(v));
        }
        if let Some(v) = repr.subset_of {
            operators.insert(PolicyOperator::SubsetOf(v));
        }
        if let Some(v) = repr.superset_of {
            operators.insert(PolicyOperator::SupersetOf(v));
        }
        if let Some(v) = repr.essential {
            operators.insert(PolicyOperator::Essential(v));
        }
        operators
    }
}

impl From<PolicyOperators> for OperatorsRepr {
    fn from(operators: PolicyOperators) -> Self {
        let mut repr = OperatorsRepr::default();
        for operator in operators.0 {
            match operator {
                PolicyOperator::Value(v) => repr.value = Some(v),
                PolicyOperator::Add(v) => repr.add = Some(v),
                PolicyOperator::Default(v) => repr.default_value = Some(v),
                PolicyOperator::OneOf(v) => repr.one_of = Some(v),
                PolicyOperator::SubsetOf(v) => repr.subset_of = Some(v),
                PolicyOperator::SupersetOf(v) => repr.superset_of = Some(v),
                PolicyOperator::Essential(v) => repr.essential = Some(v),
            }
        }
        repr
    }
}

/// Parameter policies of one entity type, keyed by parameter name.
pub type ParameterPolicies = BTreeMap<String, PolicyOperators>;

/// The `metadata_policy` claim: parameter policies per entity type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_entity: Option<ParameterPolicies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openid_provider: Option<ParameterPolicies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openid_relying_party: Option<ParameterPolicies>,
}

impl MetadataPolicy {
    pub fn get(&self, entity_type: EntityType) -> Option<&ParameterPolicies> {
        match entity_type {
            EntityType::FederationEntity => self.federation_entity.as_ref(),
            EntityType::OpenidProvider => self.openid_provider.as_ref(),
            EntityType::OpenidRelyingParty => self.openid_relying_party.as_ref(),
        }
    }

    fn slot(&mut self, entity_type: EntityType) -> &mut Option<ParameterPolicies> {
        match entity_type {
            EntityType::FederationEntity => &mut self.federation_entity,
            EntityType::OpenidProvider => &mut self.openid_provider,
            EntityType::OpenidRelyingParty => &mut self.openid_relying_party,
        }
    }

    /// Sets the operators for one parameter of one entity type.
    pub fn set(&mut self, entity_type: EntityType, key: impl Into<String>, operators: PolicyOperators) {
        self.slot(entity_type)
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), operators);
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, entity_type: EntityType, key: impl Into<String>, operators: PolicyOperators) -> Self {
        self.set(entity_type, key, operators);
        self
    }

    pub fn is_empty(&self) -> bool {
        EntityType::ALL
            .iter()
            .all(|t| self.get(*t).map_or(true, BTreeMap::is_empty))
    }

    /// Merges `other` into a copy of `self` and checks every merged
    /// parameter for conflicts.
    ///
    /// # Errors
    ///
    /// Returns the first merge failure or conflict found.
    pub fn merge(&self, other: &MetadataPolicy) -> Result<MetadataPolicy, PolicyError> {
        let mut merged = self.clone();
        for entity_type in EntityType::ALL {
            let Some(theirs) = other.get(entity_type) else {
                continue;
            };
            let ours = merged.slot(entity_type).get_or_insert_with(BTreeMap::new);
            for (key, operators) in theirs {
                let combined = match ours.get(key) {
                    Some(existing) => existing.merge(operators, key)?,
                    None => operators.clone(),
                };
                combined.check_conflicts(key)?;
                ours.insert(key.clone(), combined);
            }
        }
        Ok(merged)
    }

    /// Folds policies from highest to lowest authority into one.
    ///
    /// The first policy is the one issued closest to the trust anchor.
    pub fn merge_all<'a, I>(policies: I) -> Result<MetadataPolicy, PolicyError>
    where
        I: IntoIterator<Item = &'a MetadataPolicy>,
    {
        policies
            .into_iter()
            .try_fold(MetadataPolicy::default(), |acc, policy| acc.merge(policy))
    }

    /// Applies this policy to `metadata`, returning the resulting metadata.
    ///
    /// Only entity types present in `metadata` are affected. Within an entity
    /// type every policed parameter is resolved, including parameters the
    /// metadata does not set; a `null` result removes the parameter.
    ///
    /// # Errors
    ///
    /// Returns the first [`PolicyError`] raised by an operator.
    pub fn apply(&self, metadata: &Metadata) -> Result<Metadata, PolicyError> {
        let mut result = metadata.clone();
        for entity_type in EntityType::ALL {
            let (Some(policies), Some(parameters)) = (self.get(entity_type), metadata.get(entity_type)) else {
                continue;
            };

            let mut parameters = parameters.clone();
            for (key, operators) in policies {
                let current = parameters.remove(key).unwrap_or(Value::Null);
                let resolved = operators.resolve(key, current)?;
                if !resolved.is_null() {
                    parameters.insert(key.clone(), resolved);
                }
            }
            tracing::trace!(entity_type = %entity_type, "applied metadata policy");
            result.set(entity_type, Some(parameters));
        }
        Ok(result)
    }
}
