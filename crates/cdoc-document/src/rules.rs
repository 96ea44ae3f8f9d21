//! # Roles and Transition Rules
//!
//! A role is a named set of accounts. A transition rule says which fields
//! members of its roles may change between two consecutive versions. Rules
//! match on compact paths: `Exact` requires equality, `Prefix` lets a rule on
//! `entity.addresses` cover every leaf below it.
//!
//! ## Default rules
//!
//! Every successor version changes its version identifiers, author and
//! timestamp. A role that is granted any rule is also granted exact rules on
//! those bookkeeping fields; without them no narrow collaborator could ever
//! produce a new version.

use cdoc_core::{AccountId, RoleKey, RuleKey};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::tree::ChangedField;

/// How a rule's field selector is compared with a changed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Compact paths are equal.
    Exact,
    /// The changed path starts with the selector.
    Prefix,
}

impl MatchType {
    /// Readable name, also the leaf value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
        }
    }
}

/// What a rule permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    /// Change the value, add it or remove it.
    Edit,
}

impl TransitionAction {
    /// Readable name, also the leaf value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
        }
    }
}

/// A role and its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role key.
    pub key: RoleKey,
    /// Member accounts.
    pub collaborators: Vec<AccountId>,
}

/// A permission binding roles to an editable field pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    /// Rule key.
    pub rule_key: RuleKey,
    /// Roles whose members the rule applies to.
    pub roles: Vec<RoleKey>,
    /// Compact path or compact prefix.
    #[serde(with = "cdoc_core::serde_hex")]
    pub field: Vec<u8>,
    /// How `field` is compared.
    pub match_type: MatchType,
    /// What is permitted.
    pub action: TransitionAction,
}

impl TransitionRule {
    /// A fresh rule with a random key.
    pub fn new(roles: Vec<RoleKey>, field: Vec<u8>, match_type: MatchType) -> Self {
        Self {
            rule_key: RuleKey::random(),
            roles,
            field,
            match_type,
            action: TransitionAction::Edit,
        }
    }

    /// True if this rule covers a change at `compact`.
    pub fn matches(&self, compact: &[u8]) -> bool {
        match self.match_type {
            MatchType::Exact => compact == self.field.as_slice(),
            MatchType::Prefix => compact.starts_with(&self.field),
        }
    }
}

/// Reject `changes` unless every change is covered by one of `rules`.
///
/// All uncovered fields are reported together; nothing is partially
/// accepted.
pub fn validate_transitions(
    collaborator: &AccountId,
    rules: &[&TransitionRule],
    changes: &[ChangedField],
) -> Result<(), DocumentError> {
    let uncovered: Vec<String> = changes
        .iter()
        .filter(|change| {
            !rules
                .iter()
                .any(|rule| rule.action == TransitionAction::Edit && rule.matches(&change.compact))
        })
        .map(|change| change.property.clone())
        .collect();

    if uncovered.is_empty() {
        return Ok(());
    }
    tracing::debug!(
        collaborator = %collaborator,
        fields = ?uncovered,
        "transition rejected"
    );
    Err(DocumentError::UnauthorizedTransition {
        collaborator: collaborator.to_string(),
        fields: uncovered,
    })
}
