#![forbid(unsafe_code)]

use kataster_core::ids::{PersonId, ProtocolKey};
use kataster_core::model::{Gender, PersonInput, ProtocolDraft};
use kataster_storage::{SqliteStore, StoreError};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("kataster_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn pid(raw: i64) -> PersonId {
    PersonId::try_new(raw).expect("person id")
}

fn person(id: i64, name: &str, gender: Gender) -> PersonInput {
    PersonInput {
        id: Some(pid(id)),
        name: name.to_string(),
        gender: Some(gender),
        ..PersonInput::default()
    }
}

fn protocol(store: &mut SqliteStore, key: &str, owner: &str) -> i64 {
    store
        .protocol_create(&ProtocolDraft {
            key: Some(ProtocolKey::try_new(key).expect("protocol key")),
            owner_name: owner.to_string(),
            ..ProtocolDraft::default()
        })
        .expect("create protocol")
}

/// 1 and 2 are married, 3 is their son, 4 is married to 3, 5 is the
/// child of 3 and 4, 6 is the father of 4. 10 and 11 are a separate couple.
fn seed_two_families(store: &mut SqliteStore) {
    store
        .person_create(&person(1, "Jan Kowalski", Gender::Male))
        .expect("person 1");
    store
        .person_create(&PersonInput {
            spouse_id: Some(pid(1)),
            ..person(2, "Anna Kowalska", Gender::Female)
        })
        .expect("person 2");
    store
        .person_create(&PersonInput {
            father_id: Some(pid(1)),
            mother_id: Some(pid(2)),
            ..person(3, "Piotr Kowalski", Gender::Male)
        })
        .expect("person 3");
    store
        .person_create(&person(6, "Adam Nowak", Gender::Male))
        .expect("person 6");
    store
        .person_create(&PersonInput {
            father_id: Some(pid(6)),
            spouse_id: Some(pid(3)),
            ..person(4, "Maria Nowak", Gender::Female)
        })
        .expect("person 4");
    store
        .person_create(&PersonInput {
            father_id: Some(pid(3)),
            mother_id: Some(pid(4)),
            ..person(5, "Ewa Kowalska", Gender::Female)
        })
        .expect("person 5");
    store
        .person_create(&person(10, "Józef Wiśniewski", Gender::Male))
        .expect("person 10");
    store
        .person_create(&PersonInput {
            spouse_id: Some(pid(10)),
            ..person(11, "Zofia Wiśniewska", Gender::Female)
        })
        .expect("person 11");
}

fn ids(component: &kataster_core::genealogy::FamilyComponent) -> Vec<i64> {
    component.persons.iter().map(|p| p.id.get()).collect()
}

#[test]
fn component_spans_blood_and_in_law_links() {
    let dir = temp_dir("component_spans_blood_and_in_law_links");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    seed_two_families(&mut store);

    let component = store.family_component(pid(5)).expect("component");
    assert_eq!(ids(&component), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(component.marriages.len(), 2);
    assert!(component.unresolved.is_empty());

    for root in [1, 2, 3, 4, 6] {
        let other = store.family_component(pid(root)).expect("component");
        assert_eq!(ids(&other), ids(&component), "root {root}");
    }

    let separate = store.family_component(pid(10)).expect("component");
    assert_eq!(ids(&separate), vec![10, 11]);
    assert_eq!(separate.marriages.len(), 1);
}

#[test]
fn unknown_root_is_reported() {
    let dir = temp_dir("unknown_root_is_reported");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    seed_two_families(&mut store);

    let err = store.family_component(pid(999)).expect_err("missing root");
    assert!(matches!(err, StoreError::UnknownPerson(999)), "{err:?}");
}

#[test]
fn isolated_person_is_a_singleton_component() {
    let dir = temp_dir("isolated_person_is_a_singleton_component");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    store
        .person_create(&person(42, "Stanisław Lis", Gender::Male))
        .expect("person");

    let component = store.family_component(pid(42)).expect("component");
    assert_eq!(ids(&component), vec![42]);
    assert!(component.marriages.is_empty());
}

#[test]
fn family_tree_resolves_protocol_to_lowest_linked_person() {
    let dir = temp_dir("family_tree_resolves_protocol_to_lowest_linked_person");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    protocol(&mut store, "KOWALSKI_JAN", "Jan Kowalski");
    seed_two_families(&mut store);

    let key = ProtocolKey::try_new("KOWALSKI_JAN").expect("key");
    for id in [3, 5] {
        let current = store.person_get(pid(id)).expect("person");
        store
            .person_update(
                pid(id),
                &PersonInput {
                    id: Some(pid(id)),
                    name: current.name,
                    gender: current.gender,
                    father_id: current.father_id,
                    mother_id: current.mother_id,
                    protocol_key: Some(key.clone()),
                    ..PersonInput::default()
                },
            )
            .expect("link protocol");
    }

    let tree = store.family_tree("KOWALSKI_JAN").expect("tree");
    assert_eq!(tree.root_id, pid(3));
    assert_eq!(tree.persons.len(), 6);
    let root = tree.person(pid(3)).expect("root in tree");
    assert_eq!(root.protocol_key.as_ref(), Some(&key));
    let child = tree.person(pid(5)).expect("child in tree");
    assert_eq!(child.protocol_key, None);
    assert_eq!(child.father_id, Some(pid(3)));
}

#[test]
fn family_tree_distinguishes_missing_protocol_and_missing_person() {
    let dir = temp_dir("family_tree_distinguishes_missing_protocol_and_missing_person");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    protocol(&mut store, "PUSTY", "Bez Rodziny");

    let err = store.family_tree("NIEMA").expect_err("unknown protocol");
    assert!(matches!(err, StoreError::UnknownProtocol(ref key) if key == "NIEMA"), "{err:?}");

    let err = store.family_tree("PUSTY").expect_err("no person");
    assert!(
        matches!(err, StoreError::NoPersonForProtocol(ref key) if key == "PUSTY"),
        "{err:?}"
    );
}

#[test]
fn population_graph_covers_every_person_and_link() {
    let dir = temp_dir("population_graph_covers_every_person_and_link");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    seed_two_families(&mut store);

    let graph = store.population_graph().expect("graph");
    assert_eq!(graph.nodes.len(), 8);
    let marriages = graph.edges.iter().filter(|e| e.is_marriage()).count();
    let parents = graph.edges.len() - marriages;
    assert_eq!(marriages, 3);
    assert_eq!(parents, 5);
}
