#![forbid(unsafe_code)]

use kataster_core::fixtures::FixtureSet;
use kataster_core::ids::ProtocolKey;
use kataster_core::model::{Ownership, ParcelCategory, ProtocolDraft};
use kataster_storage::{PlotSelection, SqliteStore, StoreError};
use std::collections::BTreeSet;
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

fn draft(key: &str, owner: &str) -> ProtocolDraft {
    ProtocolDraft {
        key: Some(ProtocolKey::try_new(key).expect("protocol key")),
        owner_name: owner.to_string(),
        ..ProtocolDraft::default()
    }
}

const OWNERS: &str = r#"{
  "NOWAK_JAN": {
    "ownerName": "Jan Nowak",
    "orderNumber": "12",
    "houseNumber": "7",
    "ownershipHistory": "Po ojcu\\nod 1900",
    "remarks": "spór o miedzę",
    "powiazania_i_transakcje": "Sprzedał łąkę [[Kowalskiemu|KOWAL_PIOTR]] oraz [[bratu|NOWAK_ADAM]].",
    "realagriculturalPlots": ["100", "10"],
    "agriculturalPlots": [{"numerator": "800", "denominator": "2"}]
  },
  "KOWAL_PIOTR": {
    "ownerName": "Piotr Kowal",
    "orderNumber": 3,
    "powiazania_i_transakcje": "Kupił od [[Nowaka|NOWAK_JAN]]."
  }
}"#;

const PARCELS: &str = r#"{
  "10": {"kategoria": "rolna", "geometria": [[50.0, 19.0], [50.1, 19.0], [50.1, 19.1]]},
  "100": {"kategoria": "rolna", "geometria": [[50.2, 19.0], [50.3, 19.0], [50.3, 19.1]]},
  "7": {"kategoria": "dom", "geometria": [50.05, 19.05]}
}"#;

fn imported_store(test_name: &str) -> SqliteStore {
    let dir = temp_dir(test_name);
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    let fixtures = FixtureSet::from_json(OWNERS, PARCELS, None, None).expect("fixtures");
    store.import_fixtures(&fixtures).expect("import");
    store
}

#[test]
fn detail_renders_links_history_and_sorted_plots() {
    let mut store = imported_store("detail_renders_links_history_and_sorted_plots");

    let detail = store.protocol_detail("NOWAK_JAN").expect("detail");
    assert_eq!(detail.protocol.owner_name, "Jan Nowak");
    assert_eq!(detail.protocol.order_number, Some(12));
    assert!(!detail.has_family_tree);

    let actual: Vec<&str> = detail.actual_plots.iter().map(|p| p.number.as_str()).collect();
    assert_eq!(actual, vec!["7", "10", "100"]);
    let declared: Vec<&str> = detail
        .protocol_plots
        .iter()
        .map(|p| p.number.as_str())
        .collect();
    assert_eq!(declared, vec!["800/2"]);
    let house = detail.house_parcel_id.expect("house linked");
    assert!(
        detail
            .actual_plots
            .iter()
            .any(|p| p.id == house && p.category == ParcelCategory::House)
    );

    assert_eq!(
        detail.relations_html,
        "Sprzedał łąkę <a href=\"protokol.html?ownerId=KOWAL_PIOTR\">Kowalskiemu</a> oraz \
         <a href=\"protokol.html?ownerId=NOWAK_ADAM\">bratu</a>."
    );
    assert_eq!(
        detail.full_history,
        "Po ojcu<br>od 1900<hr><b>Ciąg dalszy / Uwagi:</b><br>spór o miedzę"
    );

    let err = store.protocol_detail("NIKT").expect_err("unknown");
    assert!(matches!(err, StoreError::UnknownProtocol(_)), "{err:?}");
}

#[test]
fn overview_orders_by_order_number_and_reports_range() {
    let mut store = imported_store("overview_orders_by_order_number_and_reports_range");
    let overview = store.protocols_overview().expect("overview");
    let keys: Vec<&str> = overview.owners.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["KOWAL_PIOTR", "NOWAK_JAN"]);
    assert_eq!((overview.order_min, overview.order_max), (3, 12));
}

#[test]
fn protocol_graph_keeps_dangling_targets() {
    let mut store = imported_store("protocol_graph_keeps_dangling_targets");
    let graph = store.protocol_graph().expect("graph");
    assert_eq!(graph.nodes.len(), 2);
    let edges: BTreeSet<(String, String)> = graph
        .edges
        .iter()
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect();
    let expected: BTreeSet<(String, String)> = [
        ("KOWAL_PIOTR", "NOWAK_JAN"),
        ("NOWAK_JAN", "KOWAL_PIOTR"),
        ("NOWAK_JAN", "NOWAK_ADAM"),
    ]
    .into_iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    assert_eq!(edges, expected);
}

#[test]
fn update_replaces_parcel_links() {
    let mut store = imported_store("update_replaces_parcel_links");
    let parcels = store.parcels_list().expect("parcels");
    let by_number = |n: &str| {
        parcels
            .iter()
            .find(|p| p.number == n)
            .map(|p| p.id)
            .expect("parcel")
    };
    let kowal = store
        .protocols_list()
        .expect("list")
        .into_iter()
        .find(|p| p.key.as_str() == "KOWAL_PIOTR")
        .expect("kowal");

    let selection = PlotSelection {
        actual: [by_number("10")].into_iter().collect(),
        protocol: [by_number("10"), by_number("100")].into_iter().collect(),
    };
    let mut edited = draft("KOWAL_PIOTR", "Piotr Kowal");
    edited.order_number = Some(4);
    store
        .protocol_update(kowal.id, &edited, Some(&selection))
        .expect("update");

    let (protocol, plots) = store.protocol_get(kowal.id).expect("get");
    assert_eq!(protocol.order_number, Some(4));
    let links: Vec<(&str, Ownership)> = plots
        .iter()
        .map(|p| (p.plot.number.as_str(), p.ownership))
        .collect();
    assert_eq!(
        links,
        vec![("10", Ownership::Actual), ("100", Ownership::Protocol)]
    );

    let missing = PlotSelection {
        actual: [9_999].into_iter().collect(),
        protocol: BTreeSet::new(),
    };
    let err = store
        .protocol_update(kowal.id, &edited, Some(&missing))
        .expect_err("unknown parcel");
    assert!(matches!(err, StoreError::UnknownParcel(9_999)), "{err:?}");
    assert_eq!(store.protocol_get(kowal.id).expect("get").1.len(), 2);
}

#[test]
fn create_rejects_duplicate_keys_and_delete_cascades() {
    let dir = temp_dir("create_rejects_duplicate_keys_and_delete_cascades");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");

    let id = store
        .protocol_create(&draft("WIDAWSKI", "Tomasz Widawski"))
        .expect("create");
    let err = store
        .protocol_create(&draft("WIDAWSKI", "Inny Widawski"))
        .expect_err("duplicate");
    assert!(matches!(err, StoreError::DuplicateKey(_)), "{err:?}");

    let err = store
        .protocol_create(&ProtocolDraft::default())
        .expect_err("no key");
    assert!(matches!(err, StoreError::InvalidInput(_)), "{err:?}");

    let keys = store.protocol_keys().expect("keys");
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].name, "Tomasz Widawski");

    store.protocol_delete(id).expect("delete");
    assert!(store.protocols_list().expect("list").is_empty());
    let err = store.protocol_delete(id).expect_err("gone");
    assert!(matches!(err, StoreError::UnknownProtocol(_)), "{err:?}");
}

#[test]
fn blank_optional_fields_are_stored_as_none() {
    let dir = temp_dir("blank_optional_fields_are_stored_as_none");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");

    let mut created = draft("PUSTY", "Jan Pusty");
    created.house_number = Some(String::new());
    created.relations = Some("   ".to_string());
    created.remarks = Some(" miedza ".to_string());
    let id = store.protocol_create(&created).expect("create");

    let (protocol, _) = store.protocol_get(id).expect("get");
    assert_eq!(protocol.house_number, None);
    assert_eq!(protocol.relations, None);
    assert_eq!(protocol.remarks.as_deref(), Some("miedza"));

    let mut edited = draft("PUSTY", "Jan Pusty");
    edited.house_number = Some("12".to_string());
    edited.interpretation = Some("\n\t".to_string());
    edited.protocol_location = Some(String::new());
    store.protocol_update(id, &edited, None).expect("update");

    let protocol = store
        .protocols_list()
        .expect("list")
        .into_iter()
        .find(|p| p.id == id)
        .expect("listed");
    assert_eq!(protocol.house_number.as_deref(), Some("12"));
    assert_eq!(protocol.interpretation, None);
    assert_eq!(protocol.protocol_location, None);
    assert_eq!(protocol.remarks, None, "update rewrites every field");
}
