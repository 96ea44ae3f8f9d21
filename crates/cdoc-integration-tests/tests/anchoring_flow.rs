//! # Anchoring Flow
//!
//! Three nodes collaborate on one entity: signatures are gathered from every
//! collaborator, the root is anchored once, and every node ends up holding
//! the same committed version. Field proofs produced by any node verify
//! against the anchored root.

mod common;

use cdoc_core::{AccountId, Hash32};
use cdoc_crypto::Ed25519KeyPair;
use cdoc_document::{verify_field_proof, CollaboratorsAccess, Document, Status};
use cdoc_node::AnchorRepository;
use cdoc_schemes::{Entity, EntityData};
use proptest::prelude::*;
use serde_json::json;

use common::{acme, commit, create_and_commit, Harness};

#[tokio::test]
async fn every_collaborator_holds_the_anchored_version() {
    let h = Harness::new();
    let (alice, bob, carol) = (h.join(), h.join(), h.join());
    let access = CollaboratorsAccess {
        read: vec![carol.account()],
        read_write: vec![bob.account()],
    };
    let doc = create_and_commit(
        &alice,
        Entity::create(alice.account(), acme(), &access, vec![])
            .unwrap()
            .into(),
    )
    .await;
    assert_eq!(h.ledger.len(), 1);

    let record = h.ledger.get_anchor(&doc.current_version()).await.unwrap();
    for node in [&alice, &bob, &carol] {
        let mut held = node.node.service().get_latest(&doc.id()).unwrap();
        assert_eq!(held.current_version(), doc.current_version());
        assert_eq!(held.status(), Status::Committed);
        assert_eq!(held.core().signatures().len(), 3);
        assert_eq!(held.calculate_document_root().unwrap(), record.document_root);
    }
    assert_eq!(record.next_anchor_id, doc.core().next_version());

    let proof = carol
        .node
        .service()
        .create_proofs(&doc.id(), &["entity.legal_name", "cd_tree.author"])
        .unwrap();
    assert_eq!(proof.document_root, record.document_root);
    for field in &proof.fields {
        verify_field_proof(field, &record.document_root).unwrap();
    }
    assert_eq!(proof.fields[0].value, b"Acme Trading Ltd".to_vec());
}

#[tokio::test]
async fn successor_takes_the_announced_version() {
    let h = Harness::new();
    let (alice, bob) = (h.join(), h.join());
    let v1 = create_and_commit(
        &alice,
        Entity::create(
            alice.account(),
            acme(),
            &CollaboratorsAccess::read_write([bob.account()]),
            vec![],
        )
        .unwrap()
        .into(),
    )
    .await;

    let base = bob.node.service().get_latest(&v1.id()).unwrap();
    let edit = base
        .as_entity()
        .unwrap()
        .derive_update(
            bob.account(),
            &json!({"legal_name": "Acme Handels GmbH"}),
            &CollaboratorsAccess::default(),
            vec![],
        )
        .unwrap();
    let v2 = bob.node.service().update(edit.into()).unwrap();
    assert_eq!(v2.current_version(), v1.core().next_version());
    assert_eq!(v2.previous_version(), Some(v1.current_version()));
    commit(&bob, &v2).await;

    assert_eq!(h.ledger.len(), 2);
    let first = h.ledger.get_anchor(&v1.current_version()).await.unwrap();
    assert_eq!(first.next_anchor_id, v2.current_version());
    h.ledger.get_anchor(&v2.current_version()).await.unwrap();

    let at_alice = alice.node.service().get_latest(&v1.id()).unwrap();
    assert_eq!(at_alice.current_version(), v2.current_version());
    assert_eq!(at_alice.status(), Status::Committed);
    assert_eq!(
        at_alice.as_entity().unwrap().data().legal_name,
        "Acme Handels GmbH"
    );
    // Older versions stay addressable.
    let old = alice.node.service().get_version(&v1.current_version()).unwrap();
    assert_eq!(old.as_entity().unwrap().data().legal_name, "Acme Trading Ltd");
}

#[tokio::test]
async fn proofs_from_a_stale_version_do_not_verify_against_the_new_root() {
    let h = Harness::new();
    let alice = h.join();
    let v1 = create_and_commit(
        &alice,
        Entity::create(alice.account(), acme(), &CollaboratorsAccess::default(), vec![])
            .unwrap()
            .into(),
    )
    .await;
    let old_proof = alice
        .node
        .service()
        .create_proofs(&v1.id(), &["entity.legal_name"])
        .unwrap();

    let edit = v1
        .as_entity()
        .unwrap()
        .derive_update(
            alice.account(),
            &json!({"legal_name": "Renamed"}),
            &CollaboratorsAccess::default(),
            vec![],
        )
        .unwrap();
    let v2 = alice.node.service().update(edit.into()).unwrap();
    commit(&alice, &v2).await;

    let record = h.ledger.get_anchor(&v2.current_version()).await.unwrap();
    assert!(verify_field_proof(&old_proof.fields[0], &record.document_root).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn legal_name_proof_binds_to_its_root(name in "[A-Za-z0-9 ]{1,40}") {
        let author = AccountId::random();
        let data = EntityData { legal_name: name.clone(), ..acme() };
        let mut doc = Entity::create(author, data, &CollaboratorsAccess::default(), vec![]).unwrap();
        doc.sign(author, &Ed25519KeyPair::generate()).unwrap();
        let root = doc.calculate_document_root().unwrap();

        let proof = doc.create_proofs(&["entity.legal_name"]).unwrap();
        prop_assert_eq!(&proof.fields[0].value, &name.as_bytes().to_vec());
        prop_assert!(verify_field_proof(&proof.fields[0], &root).is_ok());
        prop_assert!(verify_field_proof(&proof.fields[0], &Hash32::from_bytes([7; 32])).is_err());
    }
}
