//! Scheme identifiers and the compact prefixes that namespace their leaves.

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// A document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Legal entity master data.
    Entity,
    /// A grant of access to an entity for a counterparty.
    EntityRelationship,
    /// Attributes and collaborators only.
    Generic,
}

impl Scheme {
    /// Every scheme, in registry order.
    pub const ALL: [Scheme; 3] = [Scheme::Entity, Scheme::EntityRelationship, Scheme::Generic];

    /// Readable name, also the root segment of the scheme's data tree paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::EntityRelationship => "entity_relationship",
            Self::Generic => "generic",
        }
    }

    /// 4-byte compact prefix of the scheme's data tree.
    pub fn compact_prefix(&self) -> [u8; 4] {
        match self {
            Self::Entity => [0, 3, 0, 0],
            Self::EntityRelationship => [0, 4, 0, 0],
            Self::Generic => [0, 5, 0, 0],
        }
    }

    /// Parse a readable scheme name.
    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| DocumentError::InvalidPayload(format!("unknown scheme {s:?}")))
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
