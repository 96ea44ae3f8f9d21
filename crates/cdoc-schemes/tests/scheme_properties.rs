//! Property tests over the entity scheme's tree and merge behaviour.

use cdoc_core::AccountId;
use cdoc_document::{CollaboratorsAccess, Document};
use cdoc_schemes::{Address, Contact, Entity, EntityData, SchemeRegistry};
use proptest::prelude::*;

fn arb_data() -> impl Strategy<Value = EntityData> {
    (
        "[A-Za-z ]{1,24}",
        prop::collection::vec(("[a-z]{0,8}", "[A-Z]{2}", any::<bool>()), 0..4),
        prop::collection::vec(("[a-z]{1,8}", "[a-z]{0,8}@x\\.example"), 0..3),
    )
        .prop_map(|(legal_name, addresses, contacts)| EntityData {
            identity: None,
            legal_name,
            addresses: addresses
                .into_iter()
                .map(|(label, country, is_main)| Address {
                    label,
                    country,
                    is_main,
                    ..Default::default()
                })
                .collect(),
            payment_details: vec![],
            contacts: contacts
                .into_iter()
                .map(|(name, email)| Contact {
                    name,
                    email,
                    ..Default::default()
                })
                .collect(),
        })
}

proptest! {
    #[test]
    fn prop_packed_entity_keeps_data_root(data in arb_data()) {
        let mut entity = Entity::create(
            AccountId::random(),
            data,
            &CollaboratorsAccess::default(),
            vec![],
        ).unwrap();
        let root = entity.calculate_data_root().unwrap();
        let bytes = entity.pack_core().unwrap().to_bytes().unwrap();
        let mut back = SchemeRegistry::with_defaults().decode(&bytes).unwrap();
        prop_assert_eq!(back.calculate_data_root().unwrap(), root);
    }

    #[test]
    fn prop_address_count_matches_length_leaf(data in arb_data()) {
        let count = data.addresses.len();
        let entity = Entity::create(
            AccountId::random(),
            data,
            &CollaboratorsAccess::default(),
            vec![],
        ).unwrap();
        let tree = entity.data_tree().unwrap();
        let leaf = tree.leaf("entity.addresses.length").unwrap();
        prop_assert_eq!(leaf.value.clone(), (count as u64).to_be_bytes().to_vec());
    }

    #[test]
    fn prop_merge_with_own_fields_is_identity(data in arb_data()) {
        let patch = serde_json::to_value(&data).unwrap();
        prop_assert_eq!(data.merged(&patch).unwrap(), data);
    }
}
