//! Generic documents: no scheme payload, everything lives in the envelope
//! (attributes, roles, rules, NFTs). The data tree has a single leaf naming
//! the scheme so the data root is always defined.

use cdoc_core::AccountId;
use cdoc_document::{
    Attribute, CollaboratorsAccess, CoreDocument, Document, DocumentError, DocumentTree,
    PackedDocument, Scheme,
};

/// Field number of the scheme leaf.
pub const SCHEME_FIELD: u32 = 1;

/// A generic document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generic {
    core: CoreDocument,
}

impl Generic {
    /// Create version 1.
    pub fn create(
        author: AccountId,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<Self, DocumentError> {
        Ok(Self {
            core: CoreDocument::new(Scheme::Generic, None, author, access, attributes)?,
        })
    }

    /// A new generic document seeded with the roles, rules and unsigned
    /// attributes of `template`.
    pub fn from_template(template: &dyn Document, author: AccountId) -> Result<Self, DocumentError> {
        Ok(Self {
            core: CoreDocument::from_template(Scheme::Generic, author, template.core())?,
        })
    }

    /// Derive the next version.
    pub fn derive_update(
        &self,
        author: AccountId,
        access: &CollaboratorsAccess,
        attributes: Vec<Attribute>,
    ) -> Result<Self, DocumentError> {
        Ok(Self {
            core: self.core.prepare_new_version(author, access, attributes)?,
        })
    }

    /// Rebuild from the stored form.
    pub fn from_packed(packed: PackedDocument) -> Result<Self, DocumentError> {
        let (core, _) = packed.unpack_core(Scheme::Generic)?;
        Ok(Self { core })
    }
}

impl Document for Generic {
    fn scheme(&self) -> Scheme {
        Scheme::Generic
    }

    fn core(&self) -> &CoreDocument {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CoreDocument {
        &mut self.core
    }

    fn data_tree(&self) -> Result<DocumentTree, DocumentError> {
        let mut b = self.core.data_tree_builder();
        let root = b.root().clone();
        b.add(root.field(SCHEME_FIELD, "scheme"), Scheme::Generic.as_str());
        b.build()
    }

    fn payload(&self) -> Result<serde_json::Value, DocumentError> {
        Ok(serde_json::Value::Object(Default::default()))
    }
}
