//! # Collaboration Validator
//!
//! Decides whether a proposed next version is an authorised mutation by a
//! given collaborator, and re-checks received documents before a node signs
//! or stores them.
//!
//! ## Authorisation order
//!
//! 1. Scheme and document identity must match.
//! 2. Owner-restricted schemes accept only their owner, in both versions.
//! 3. The envelope diff and the payload diff are collected together.
//! 4. An empty diff passes.
//! 5. A read-write collaborator of the old version passes outright.
//! 6. Otherwise every changed field must be covered by a rule granted to
//!    the collaborator through a role of the old version.
//!
//! Rejection is all-or-nothing.

use cdoc_core::{AccountId, Hash32};

use crate::error::DocumentError;
use crate::keys::KeyRegistry;
use crate::model::Document;
use crate::rules::validate_transitions;

/// Check that `collaborator` may turn `old` into `new`.
///
/// # Errors
///
/// - `InvalidDocumentType` if the schemes differ.
/// - `InvalidIdentifier` if the document identifiers differ.
/// - `NotOwner` for owner-restricted schemes.
/// - `UnauthorizedTransition` listing every uncovered field.
pub fn collaborator_can_update(
    old: &dyn Document,
    new: &dyn Document,
    collaborator: &AccountId,
) -> Result<(), DocumentError> {
    if old.scheme() != new.scheme() {
        return Err(DocumentError::InvalidDocumentType {
            expected: old.scheme().to_string(),
            actual: new.scheme().to_string(),
        });
    }
    if old.id() != new.id() {
        return Err(DocumentError::InvalidIdentifier {
            expected: old.id().to_string(),
            actual: new.id().to_string(),
        });
    }
    if [old.owner(), new.owner()]
        .into_iter()
        .flatten()
        .any(|owner| owner != *collaborator)
    {
        return Err(DocumentError::NotOwner(collaborator.to_string()));
    }

    let mut changes = old.core_changes(new)?;
    changes.extend(old.payload_changes(new)?);
    if changes.is_empty() {
        return Ok(());
    }
    if old.core().collaborators().can_write(collaborator) {
        return Ok(());
    }
    let rules = old.core().transition_rules_for(collaborator);
    validate_transitions(collaborator, &rules, &changes)
}

/// Recompute the data and signing roots of a received document and verify
/// the signatures it already carries. Returns the signing root.
pub fn verify_signing_state(
    doc: &mut dyn Document,
    keys: &dyn KeyRegistry,
) -> Result<Hash32, DocumentError> {
    let signing_root = doc.calculate_signing_root()?;
    doc.core().verify_signatures(keys)?;
    Ok(signing_root)
}

/// Recompute every root of a received anchored document and verify its
/// signatures. Returns the document root.
pub fn verify_anchored(doc: &mut dyn Document, keys: &dyn KeyRegistry) -> Result<Hash32, DocumentError> {
    verify_signing_state(doc, keys)?;
    doc.calculate_document_root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorsAccess;
    use crate::engine::{CoreDocument, Status};
    use crate::keys::{InMemoryKeyRegistry, KeyPurpose};
    use crate::rules::MatchType;
    use crate::scheme::Scheme;
    use crate::tree::DocumentTree;
    use cdoc_core::RoleKey;
    use cdoc_crypto::Ed25519KeyPair;

    #[derive(Debug, Clone)]
    struct Note {
        core: CoreDocument,
        title: String,
        body: String,
        owner: Option<AccountId>,
    }

    impl Document for Note {
        fn scheme(&self) -> Scheme {
            self.core.scheme()
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
            b.add(root.field(1, "title"), &self.title);
            b.add(root.field(2, "body"), &self.body);
            b.build()
        }
        fn payload(&self) -> Result<serde_json::Value, DocumentError> {
            Ok(serde_json::json!({ "title": self.title, "body": self.body }))
        }
        fn owner(&self) -> Option<AccountId> {
            self.owner
        }
    }

    fn committed_note(author: AccountId, keys: &Ed25519KeyPair) -> Note {
        let core = CoreDocument::new(
            Scheme::Generic,
            None,
            author,
            &CollaboratorsAccess::default(),
            vec![],
        )
        .unwrap();
        let mut note = Note {
            core,
            title: "t".into(),
            body: "b".into(),
            owner: None,
        };
        note.sign(author, keys).unwrap();
        note.calculate_document_root().unwrap();
        note.core_mut().set_status(Status::Committed).unwrap();
        note
    }

    fn next(note: &Note, author: AccountId) -> Note {
        Note {
            core: note
                .core
                .prepare_new_version(author, &CollaboratorsAccess::default(), vec![])
                .unwrap(),
            ..note.clone()
        }
    }

    #[test]
    fn test_writer_passes_outright() {
        let author = AccountId::random();
        let keys = Ed25519KeyPair::generate();
        let old = committed_note(author, &keys);
        let mut new = next(&old, author);
        new.title = "changed".into();
        collaborator_can_update(&old, &new, &author).unwrap();
    }

    #[test]
    fn test_stranger_is_rejected() {
        let author = AccountId::random();
        let old = committed_note(author, &Ed25519KeyPair::generate());
        let stranger = AccountId::random();
        let mut new = next(&old, stranger);
        new.title = "changed".into();
        match collaborator_can_update(&old, &new, &stranger) {
            Err(DocumentError::UnauthorizedTransition { fields, .. }) => {
                assert!(fields.contains(&"generic.title".to_string()));
                assert!(fields.contains(&"cd_tree.author".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_role_scoped_rule() {
        let author = AccountId::random();
        let keys = Ed25519KeyPair::generate();
        let editor = AccountId::random();
        let core = CoreDocument::new(
            Scheme::Generic,
            None,
            author,
            &CollaboratorsAccess::default(),
            vec![],
        )
        .unwrap();
        let mut old = Note {
            core,
            title: "t".into(),
            body: "b".into(),
            owner: None,
        };
        let role = RoleKey::random();
        old.core_mut().add_role(role, vec![editor]).unwrap();
        let title = old.data_tree().unwrap().resolve_selector("generic.title").unwrap();
        old.core_mut()
            .add_transition_rule(role, title, MatchType::Exact)
            .unwrap();
        old.sign(author, &keys).unwrap();
        old.calculate_document_root().unwrap();
        old.core_mut().set_status(Status::Committed).unwrap();

        let mut ok = next(&old, editor);
        ok.title = "edited".into();
        collaborator_can_update(&old, &ok, &editor).unwrap();

        let mut too_much = next(&old, editor);
        too_much.title = "edited".into();
        too_much.body = "also edited".into();
        match collaborator_can_update(&old, &too_much, &editor) {
            Err(DocumentError::UnauthorizedTransition { fields, .. }) => {
                assert_eq!(fields, vec!["generic.body".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_owner_guard() {
        let author = AccountId::random();
        let mut old = committed_note(author, &Ed25519KeyPair::generate());
        old.owner = Some(author);
        let writer = AccountId::random();
        let new = next(&old, writer);
        assert!(matches!(
            collaborator_can_update(&old, &new, &writer),
            Err(DocumentError::NotOwner(_))
        ));
    }

    #[test]
    fn test_other_document_rejected() {
        let author = AccountId::random();
        let keys = Ed25519KeyPair::generate();
        let a = committed_note(author, &keys);
        let b = committed_note(author, &keys);
        assert!(matches!(
            collaborator_can_update(&a, &b, &author),
            Err(DocumentError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_verify_received_document() {
        let author = AccountId::random();
        let keys = Ed25519KeyPair::generate();
        let registry = InMemoryKeyRegistry::new();
        registry.register(author, keys.public_key(), KeyPurpose::Signing);
        let note = committed_note(author, &keys);
        let packed = serde_json::to_string(&note.core).unwrap();
        let mut received = Note {
            core: serde_json::from_str(&packed).unwrap(),
            ..note.clone()
        };
        let root = verify_anchored(&mut received, &registry).unwrap();
        assert_eq!(root, note.core.document_root().unwrap());
    }
}
