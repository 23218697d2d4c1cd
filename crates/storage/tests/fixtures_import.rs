#![forbid(unsafe_code)]

use kataster_core::fixtures::{
    DEMOGRAPHY_FILE, FixtureSet, GENEALOGY_FILE, OWNERS_FILE, PARCELS_FILE,
};
use kataster_core::ids::PersonId;
use kataster_core::model::{Gender, Ownership, ParcelCategory};
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

const OWNERS: &str = r#"{
  "SOWA_MACIEJ": {
    "ownerName": "Maciej Sowa",
    "orderNumber": "5",
    "houseNumber": "21",
    "protocolDate": "15 maja 1930 rok",
    "protocolLocation": "Gmina",
    "relacje_rodzinne": "Syn [[Jana|SOWA_JAN]]",
    "realbuildingPlots": ["21"],
    "realagriculturalPlots": ["300", "301"],
    "agriculturalPlots": ["301", "999"]
  },
  "SOWA_JAN": {
    "ownerName": "Jan Sowa",
    "orderNumber": "b/n",
    "protocolDate": "15 maja 1930 rok"
  },
  "BEZ|NAZWY": {
    "ownerName": "Zły Klucz"
  }
}"#;

const PARCELS: &str = r#"{
  "21": {"kategoria": "dom", "geometria": [50.0, 19.0]},
  "21 ": {"kategoria": "budowlana", "geometria": [[50.0, 19.0], [50.0, 19.01], [50.01, 19.01]]},
  "300": {"geometria": [[50.1, 19.0], [50.1, 19.01], [50.11, 19.01]]},
  "301": {"kategoria": "las", "geometria": [[50.2, 19.0], [50.2, 19.01], [50.21, 19.01]]},
  "droga 1": {"kategoria": "droga", "geometria": [[50.0, 19.0], [50.3, 19.3]]},
  "X": {"kategoria": "wulkan", "geometria": [50.0, 19.0]}
}"#;

const DEMOGRAPHY: &str = r#"[
  {"rok": 1921, "populacja_ogolem": 540, "katolicy": 500, "zydzi": 30, "inni": 10, "opis": "spis"},
  {"populacja_ogolem": 1},
  {"rok": 1900, "populacja_ogolem": 480}
]"#;

const GENEALOGY: &str = r#"{
  "persons": [
    {"id": 1, "name": "Jan Sowa", "gender": "M", "birthDate": {"year": 1860}, "spouseIds": [2]},
    {"id": 2, "name": "Agata Sowa", "gender": "F", "birthDate": {"year": 1865}},
    {"id": 3, "name": "Maciej Sowa", "gender": "M", "protocolKey": "SOWA_MACIEJ",
     "fatherId": 1, "motherId": 2, "birthDate": {"year": 1890}, "spouseIds": [4, 3, 77]},
    {"id": 4, "name": "Rozalia Sowa", "gender": "K", "fatherId": 55},
    {"id": 0, "name": "Bez Id"}
  ]
}"#;

fn fixtures() -> FixtureSet {
    FixtureSet::from_json(OWNERS, PARCELS, Some(DEMOGRAPHY), Some(GENEALOGY)).expect("fixtures")
}

#[test]
fn import_reports_every_step() {
    let dir = temp_dir("import_reports_every_step");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");

    let report = store.import_fixtures(&fixtures()).expect("import");
    assert_eq!(report.protocols, 2);
    assert_eq!(report.skipped_protocols, 1, "key with '|' is rejected");
    assert_eq!(report.parcels, 5);
    assert_eq!(report.skipped_parcels, 1, "unknown category is skipped");
    assert_eq!(report.placeholder_parcels, 1, "999 has no mapped parcel");
    assert_eq!(report.plot_links, 5);
    assert_eq!(report.house_links, 1);
    assert_eq!(report.demography, 2);
    assert_eq!(report.skipped_demography, 1);
    assert_eq!(report.persons, 4);
    assert_eq!(report.skipped_persons, 1);
    assert_eq!(report.parent_links, 2);
    assert_eq!(report.dropped_parent_links, 1);
    assert_eq!(report.marriages, 2);
    assert_eq!(report.rejected_marriages, 2, "self pair and unknown spouse");
}

#[test]
fn import_links_plots_by_category_hint() {
    let dir = temp_dir("import_links_plots_by_category_hint");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    store.import_fixtures(&fixtures()).expect("import");

    let detail = store.protocol_detail("SOWA_MACIEJ").expect("detail");
    assert!(detail.has_family_tree);
    assert_eq!(detail.protocol.protocol_location.as_deref(), Some("Gmina"));
    let date = detail.protocol.protocol_date.expect("protocol date");
    assert_eq!((date.year(), u8::from(date.month()), date.day()), (1930, 5, 15));

    let links: Vec<(&str, ParcelCategory, Ownership)> = detail
        .all_plots
        .iter()
        .map(|p| (p.plot.number.as_str(), p.plot.category, p.ownership))
        .collect();
    assert_eq!(
        links,
        vec![
            ("21", ParcelCategory::House, Ownership::Actual),
            ("21", ParcelCategory::Building, Ownership::Actual),
            ("300", ParcelCategory::Agricultural, Ownership::Actual),
            ("301", ParcelCategory::Forest, Ownership::Actual),
            ("301", ParcelCategory::Forest, Ownership::Protocol),
            ("999", ParcelCategory::Agricultural, Ownership::Protocol),
        ]
    );
    let house = detail.house_parcel_id.expect("house");
    assert!(
        detail
            .all_plots
            .iter()
            .any(|p| p.plot.id == house && p.plot.category == ParcelCategory::House)
    );

    let jan = store.protocol_detail("SOWA_JAN").expect("detail");
    assert_eq!(jan.protocol.order_number, None, "non-numeric order number");
    assert!(jan.all_plots.is_empty());
}

#[test]
fn import_builds_genealogy_with_dropped_dangling_links() {
    let dir = temp_dir("import_builds_genealogy_with_dropped_dangling_links");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    store.import_fixtures(&fixtures()).expect("import");

    let rozalia = store.person_get(pid(4)).expect("person 4");
    assert_eq!(rozalia.gender, Some(Gender::Female));
    assert_eq!(rozalia.father_id, None, "unknown father 55 dropped");

    let tree = store.family_tree("SOWA_MACIEJ").expect("tree");
    assert_eq!(tree.root_id, pid(3));
    let ids: Vec<i64> = tree.persons.iter().map(|p| p.id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    let agata = tree.person(pid(2)).expect("agata");
    assert_eq!(agata.spouse_ids, vec![pid(1)], "one-sided claim is symmetric");
    let maciej = tree.person(pid(3)).expect("maciej");
    assert_eq!(maciej.spouse_ids, vec![pid(4)]);
    assert_eq!(maciej.birth_date.map(|d| d.year), Some(1890));
}

#[test]
fn reimport_replaces_previous_contents() {
    let dir = temp_dir("reimport_replaces_previous_contents");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    store.import_fixtures(&fixtures()).expect("first import");
    let first = store.dashboard_counts().expect("counts");

    let report = store.import_fixtures(&fixtures()).expect("second import");
    assert_eq!(report.protocols, 2);
    assert_eq!(store.dashboard_counts().expect("counts"), first);
    assert_eq!(first.total_owners, 2);
    assert_eq!(first.total_objects, 6);
    assert_eq!(first.total_persons, 4);
    assert_eq!(first.total_demography, 2);
}

#[test]
fn load_dir_requires_owner_and_parcel_files() {
    let dir = temp_dir("load_dir_requires_owner_and_parcel_files");
    std::fs::write(dir.join(OWNERS_FILE), OWNERS).expect("write owners");

    let err = FixtureSet::load_dir(&dir).expect_err("parcels missing");
    let err = StoreError::from(err);
    assert!(matches!(err, StoreError::Io(_)), "{err:?}");

    std::fs::write(dir.join(PARCELS_FILE), PARCELS).expect("write parcels");
    let fixtures = FixtureSet::load_dir(&dir).expect("optional files absent");
    assert!(fixtures.persons.is_empty());
    assert!(fixtures.demography.is_empty());

    std::fs::write(dir.join(DEMOGRAPHY_FILE), DEMOGRAPHY).expect("write demography");
    std::fs::write(dir.join(GENEALOGY_FILE), "{not json").expect("write genealogy");
    let err = StoreError::from(FixtureSet::load_dir(&dir).expect_err("bad genealogy"));
    assert!(matches!(err, StoreError::InvalidFixture(_)), "{err:?}");
}

#[test]
fn duplicate_person_record_does_not_leak_links() {
    let dir = temp_dir("duplicate_person_record_does_not_leak_links");
    let mut store = SqliteStore::open(dir.join("kataster.db")).expect("open store");
    let genealogy = r#"{"persons": [
      {"id": 1, "name": "Jan Sowa", "gender": "M"},
      {"id": 2, "name": "Piotr Sowa", "gender": "M"},
      {"id": 3, "name": "Maciej Sowa", "gender": "M", "fatherId": 1},
      {"id": 3, "name": "Duplikat", "fatherId": 2, "spouseIds": [1]}
    ]}"#;
    let fixtures =
        FixtureSet::from_json(OWNERS, PARCELS, None, Some(genealogy)).expect("fixtures");

    let report = store.import_fixtures(&fixtures).expect("import");
    assert_eq!(report.persons, 3);
    assert_eq!(report.skipped_persons, 1);
    assert_eq!(report.parent_links, 1);
    assert_eq!(report.marriages, 0);

    let maciej = store.person_get(pid(3)).expect("person 3");
    assert_eq!(maciej.name, "Maciej Sowa");
    assert_eq!(maciej.father_id, Some(pid(1)));
    let component = store.family_component(pid(3)).expect("component");
    assert!(component.marriages.is_empty(), "{:?}", component.marriages);
}
