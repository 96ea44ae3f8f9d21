//! # Delegated Access
//!
//! An entity owner shares one version of an entity with an identity that is
//! not a collaborator, through an entity relationship carrying an access
//! token. The grantee fetches the entity from the owner's node.

mod common;

use cdoc_document::{CollaboratorsAccess, Document, DocumentError, Status};
use cdoc_node::{NodeError, P2pError};
use cdoc_schemes::{AnyDocument, Entity, EntityRelationship};
use serde_json::json;

use common::{acme, commit, create_and_commit, Harness, Participant};

async fn share(h: &Harness, owner: &Participant, entity: &AnyDocument, with: &Participant) -> AnyDocument {
    let relationship = EntityRelationship::create(
        owner.account(),
        &owner.keys,
        entity,
        with.account(),
        h.registry.as_ref(),
    )
    .unwrap();
    create_and_commit(owner, relationship.into()).await
}

#[tokio::test]
async fn grantee_fetches_shared_version() {
    let h = Harness::new();
    let (alice, bob) = (h.join(), h.join());
    let entity = create_and_commit(
        &alice,
        Entity::create(alice.account(), acme(), &CollaboratorsAccess::default(), vec![])
            .unwrap()
            .into(),
    )
    .await;
    assert!(bob.node.service().get_latest(&entity.id()).is_err());

    let relationship = share(&h, &alice, &entity, &bob).await;
    let at_bob = bob.node.service().get_latest(&relationship.id()).unwrap();
    assert_eq!(at_bob.status(), Status::Committed);

    let fetched = bob
        .node
        .service()
        .get_entity_by_relationship(&relationship.id())
        .await
        .unwrap();
    assert_eq!(fetched.id(), entity.id());
    assert_eq!(fetched.current_version(), entity.current_version());
    assert_eq!(fetched.status(), Status::Committed);
    assert_eq!(fetched.as_entity().unwrap().data(), &acme());
}

#[tokio::test]
async fn token_does_not_follow_newer_versions() {
    let h = Harness::new();
    let (alice, bob) = (h.join(), h.join());
    let entity = create_and_commit(
        &alice,
        Entity::create(alice.account(), acme(), &CollaboratorsAccess::default(), vec![])
            .unwrap()
            .into(),
    )
    .await;
    let relationship = share(&h, &alice, &entity, &bob).await;

    let renamed = entity
        .as_entity()
        .unwrap()
        .derive_update(
            alice.account(),
            &json!({"legal_name": "Acme Holdings Ltd"}),
            &CollaboratorsAccess::default(),
            vec![],
        )
        .unwrap();
    let v2 = alice.node.service().update(renamed.into()).unwrap();
    commit(&alice, &v2).await;

    match bob
        .node
        .service()
        .get_entity_by_relationship(&relationship.id())
        .await
    {
        Err(NodeError::P2p(P2pError::Document(DocumentError::AccessDenied(_)))) => {}
        other => panic!("expected AccessDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn revoked_relationship_carries_no_token() {
    let h = Harness::new();
    let (alice, bob) = (h.join(), h.join());
    let entity = create_and_commit(
        &alice,
        Entity::create(alice.account(), acme(), &CollaboratorsAccess::default(), vec![])
            .unwrap()
            .into(),
    )
    .await;
    let relationship = share(&h, &alice, &entity, &bob).await;

    let revoked = relationship
        .as_relationship()
        .unwrap()
        .revoke(alice.account())
        .unwrap();
    let revoked = alice.node.service().update(revoked.into()).unwrap();
    commit(&alice, &revoked).await;

    let at_bob = bob.node.service().get_latest(&relationship.id()).unwrap();
    assert_eq!(at_bob.current_version(), revoked.current_version());
    assert!(matches!(
        bob.node
            .service()
            .get_entity_by_relationship(&relationship.id())
            .await,
        Err(NodeError::Document(DocumentError::NoToken(0)))
    ));
}

#[tokio::test]
async fn only_the_owner_may_revoke() {
    let h = Harness::new();
    let (alice, bob) = (h.join(), h.join());
    let entity = create_and_commit(
        &alice,
        Entity::create(alice.account(), acme(), &CollaboratorsAccess::default(), vec![])
            .unwrap()
            .into(),
    )
    .await;
    let relationship = share(&h, &alice, &entity, &bob).await;
    assert!(matches!(
        relationship.as_relationship().unwrap().revoke(bob.account()),
        Err(DocumentError::NotOwner(_))
    ));
}

#[tokio::test]
async fn fetch_through_non_relationship_is_refused() {
    let h = Harness::new();
    let alice = h.join();
    let entity = create_and_commit(
        &alice,
        Entity::create(alice.account(), acme(), &CollaboratorsAccess::default(), vec![])
            .unwrap()
            .into(),
    )
    .await;
    assert!(matches!(
        alice.node.service().get_entity_by_relationship(&entity.id()).await,
        Err(NodeError::WrongScheme { .. })
    ));
}
