//! # Scheme Registry
//!
//! Maps a scheme to the constructor that rebuilds a typed document from its
//! packed form. Services store and exchange [`PackedDocument`]s and use the
//! registry to get back an [`AnyDocument`] they can diff, sign and prove.

use std::collections::HashMap;

use cdoc_document::{Document, DocumentError, DocumentTree, PackedDocument, Scheme};
use cdoc_core::AccountId;

use crate::entity::Entity;
use crate::generic::Generic;
use crate::relationship::EntityRelationship;

/// Any document of a known scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyDocument {
    Entity(Entity),
    EntityRelationship(EntityRelationship),
    Generic(Generic),
}

macro_rules! delegate {
    ($self:ident, $doc:ident => $body:expr) => {
        match $self {
            AnyDocument::Entity($doc) => $body,
            AnyDocument::EntityRelationship($doc) => $body,
            AnyDocument::Generic($doc) => $body,
        }
    };
}

impl AnyDocument {
    /// The entity, if this is one.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// The relationship, if this is one.
    pub fn as_relationship(&self) -> Option<&EntityRelationship> {
        match self {
            Self::EntityRelationship(r) => Some(r),
            _ => None,
        }
    }
}

impl Document for AnyDocument {
    fn scheme(&self) -> Scheme {
        delegate!(self, d => d.scheme())
    }

    fn core(&self) -> &cdoc_document::CoreDocument {
        delegate!(self, d => d.core())
    }

    fn core_mut(&mut self) -> &mut cdoc_document::CoreDocument {
        delegate!(self, d => d.core_mut())
    }

    fn data_tree(&self) -> Result<DocumentTree, DocumentError> {
        delegate!(self, d => d.data_tree())
    }

    fn payload(&self) -> Result<serde_json::Value, DocumentError> {
        delegate!(self, d => d.payload())
    }

    fn owner(&self) -> Option<AccountId> {
        delegate!(self, d => d.owner())
    }
}

impl From<Entity> for AnyDocument {
    fn from(doc: Entity) -> Self {
        Self::Entity(doc)
    }
}

impl From<EntityRelationship> for AnyDocument {
    fn from(doc: EntityRelationship) -> Self {
        Self::EntityRelationship(doc)
    }
}

impl From<Generic> for AnyDocument {
    fn from(doc: Generic) -> Self {
        Self::Generic(doc)
    }
}

/// Rebuilds a typed document from its packed form.
pub type Constructor = fn(PackedDocument) -> Result<AnyDocument, DocumentError>;

/// Scheme to constructor lookup.
#[derive(Debug, Clone, Default)]
pub struct SchemeRegistry {
    constructors: HashMap<Scheme, Constructor>,
}

impl SchemeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in scheme.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Scheme::Entity, |p| Entity::from_packed(p).map(Into::into));
        registry.register(Scheme::EntityRelationship, |p| {
            EntityRelationship::from_packed(p).map(Into::into)
        });
        registry.register(Scheme::Generic, |p| Generic::from_packed(p).map(Into::into));
        registry
    }

    /// Register or replace the constructor of `scheme`.
    pub fn register(&mut self, scheme: Scheme, constructor: Constructor) {
        self.constructors.insert(scheme, constructor);
    }

    /// True if `scheme` has a constructor.
    pub fn supports(&self, scheme: Scheme) -> bool {
        self.constructors.contains_key(&scheme)
    }

    /// Rebuild a packed document.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` if no constructor is registered for its scheme.
    pub fn unpack(&self, packed: PackedDocument) -> Result<AnyDocument, DocumentError> {
        let constructor = self.constructors.get(&packed.scheme).ok_or_else(|| {
            DocumentError::InvalidPayload(format!("unsupported scheme {}", packed.scheme))
        })?;
        constructor(packed)
    }

    /// Parse stored bytes and rebuild the document.
    pub fn decode(&self, bytes: &[u8]) -> Result<AnyDocument, DocumentError> {
        self.unpack(PackedDocument::from_bytes(bytes)?)
    }
}
