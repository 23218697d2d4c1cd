#![forbid(unsafe_code)]

use super::demography::insert_demography_tx;
use super::parcels::{insert_parcel_tx, parcel_id_tx};
use super::protocols::{insert_protocol_tx, link_parcel_tx};
use super::*;
use kataster_core::fixtures::{FixtureSet, PlotClaim, normalize_plot_number};
use kataster_core::genealogy::{MarriageSet, RejectedPairReason};
use kataster_core::geometry::Geometry;
use kataster_core::model::{Gender, Ownership, ParcelCategory, non_empty};
use rusqlite::{OptionalExtension, Transaction, params};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// What one fixture import wrote and what it had to leave out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub protocols: usize,
    pub skipped_protocols: usize,
    pub parcels: usize,
    pub skipped_parcels: usize,
    /// Parcels created without geometry because an owner listed them.
    pub placeholder_parcels: usize,
    pub plot_links: usize,
    pub house_links: usize,
    pub demography: usize,
    pub skipped_demography: usize,
    pub persons: usize,
    pub skipped_persons: usize,
    pub parent_links: usize,
    pub dropped_parent_links: usize,
    pub marriages: usize,
    pub rejected_marriages: usize,
}

const CLEAR_SQL: &str = r#"
    DELETE FROM marriages;
    DELETE FROM persons;
    DELETE FROM parcel_owners;
    DELETE FROM demography;
    DELETE FROM parcels;
    DELETE FROM protocols;
    DELETE FROM sqlite_sequence WHERE name IN ('protocols', 'parcels', 'demography');
"#;

impl SqliteStore {
    /// Replaces the whole store with the fixture contents in one transaction.
    pub fn import_fixtures(&mut self, fixtures: &FixtureSet) -> Result<ImportReport, StoreError> {
        let tx = self.conn.transaction()?;
        let mut report = ImportReport::default();

        tx.execute_batch(CLEAR_SQL)?;
        tracing::info!("import: tables cleared");

        let protocol_ids = import_protocols_tx(&tx, fixtures, &mut report)?;
        tracing::info!(
            inserted = report.protocols,
            skipped = report.skipped_protocols,
            "import: protocols"
        );

        import_parcels_tx(&tx, fixtures, &mut report)?;
        tracing::info!(
            inserted = report.parcels,
            skipped = report.skipped_parcels,
            "import: parcels"
        );

        import_plot_links_tx(&tx, fixtures, &protocol_ids, &mut report)?;
        tracing::info!(
            links = report.plot_links,
            placeholders = report.placeholder_parcels,
            "import: plot links"
        );

        import_house_links_tx(&tx, fixtures, &protocol_ids, &mut report)?;
        tracing::info!(links = report.house_links, "import: house links");

        for entry in &fixtures.demography {
            let Some(input) = entry.to_input() else {
                tracing::warn!("import: demography entry without a year skipped");
                report.skipped_demography += 1;
                continue;
            };
            match insert_demography_tx(&tx, &input) {
                Ok(_) => report.demography += 1,
                Err(StoreError::InvalidInput(reason)) => {
                    tracing::warn!(year = input.year, reason, "import: demography entry skipped");
                    report.skipped_demography += 1;
                }
                Err(err) => return Err(err),
            }
        }
        tracing::info!(inserted = report.demography, "import: demography");

        import_persons_tx(&tx, fixtures, &protocol_ids, &mut report)?;
        tracing::info!(
            persons = report.persons,
            parents = report.parent_links,
            marriages = report.marriages,
            "import: genealogy"
        );

        let imported_at = time::OffsetDateTime::now_utc().unix_timestamp().to_string();
        tx.execute(
            "INSERT INTO meta(key, value) VALUES ('imported_at', ?1) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![imported_at],
        )?;
        tx.commit()?;
        Ok(report)
    }
}

/// Returns fixture key -> protocol id for every inserted owner.
fn import_protocols_tx(
    tx: &Transaction<'_>,
    fixtures: &FixtureSet,
    report: &mut ImportReport,
) -> Result<BTreeMap<String, i64>, StoreError> {
    let mut ids = BTreeMap::new();
    for (key, owner) in &fixtures.owners {
        let draft = match owner.protocol_draft(key) {
            Ok(draft) => draft,
            Err(err) => {
                tracing::warn!(key = %key, reason = err.message(), "import: protocol skipped");
                report.skipped_protocols += 1;
                continue;
            }
        };
        match insert_protocol_tx(tx, &draft) {
            Ok(id) => {
                ids.insert(key.trim().to_string(), id);
                report.protocols += 1;
            }
            Err(StoreError::InvalidInput(reason)) => {
                tracing::warn!(key = %key, reason, "import: protocol skipped");
                report.skipped_protocols += 1;
            }
            Err(StoreError::DuplicateKey(what)) => {
                tracing::warn!(key = %key, duplicate = %what, "import: protocol skipped");
                report.skipped_protocols += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(ids)
}

fn import_parcels_tx(
    tx: &Transaction<'_>,
    fixtures: &FixtureSet,
    report: &mut ImportReport,
) -> Result<(), StoreError> {
    for (raw_number, parcel) in &fixtures.parcels {
        let Some(number) = normalize_plot_number(&Value::String(raw_number.clone())) else {
            report.skipped_parcels += 1;
            continue;
        };
        let Some(category) = parcel.category() else {
            tracing::warn!(
                number = %number,
                category = ?parcel.category,
                "import: parcel with unknown category skipped"
            );
            report.skipped_parcels += 1;
            continue;
        };
        let geometry = Geometry::from_fixture(category, &parcel.geometry);
        if geometry.is_none() && !parcel.geometry.is_null() {
            tracing::debug!(number = %number, "import: parcel geometry unusable, stored without it");
        }
        match insert_parcel_tx(tx, &number, category, geometry.as_ref())? {
            Some(_) => report.parcels += 1,
            None => {
                tracing::warn!(number = %number, category = category.as_str(), "import: duplicate parcel skipped");
                report.skipped_parcels += 1;
            }
        }
    }
    Ok(())
}

fn import_plot_links_tx(
    tx: &Transaction<'_>,
    fixtures: &FixtureSet,
    protocol_ids: &BTreeMap<String, i64>,
    report: &mut ImportReport,
) -> Result<(), StoreError> {
    for (key, owner) in &fixtures.owners {
        let Some(protocol_id) = protocol_ids.get(key.trim()).copied() else {
            continue;
        };
        for claim in owner.plot_claims() {
            let parcel_id = ensure_parcel_tx(tx, &claim, report)?;
            if link_parcel_tx(tx, protocol_id, parcel_id, claim.ownership)? {
                report.plot_links += 1;
            }
        }
    }
    Ok(())
}

/// Exact `(number, category)` match first. An agricultural hint then takes
/// any non-building parcel with that number. Otherwise a placeholder
/// parcel without geometry is created.
fn ensure_parcel_tx(
    tx: &Transaction<'_>,
    claim: &PlotClaim,
    report: &mut ImportReport,
) -> Result<i64, StoreError> {
    let wanted = if claim.building {
        ParcelCategory::Building
    } else {
        ParcelCategory::Agricultural
    };
    if let Some(id) = parcel_id_tx(tx, &claim.number, wanted)? {
        return Ok(id);
    }
    if !claim.building {
        let fallback: Option<i64> = tx
            .query_row(
                "SELECT id FROM parcels WHERE number = ?1 AND category != ?2 ORDER BY id LIMIT 1",
                params![claim.number, ParcelCategory::Building.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = fallback {
            return Ok(id);
        }
    }
    match insert_parcel_tx(tx, &claim.number, wanted, None)? {
        Some(id) => {
            report.placeholder_parcels += 1;
            Ok(id)
        }
        None => parcel_id_tx(tx, &claim.number, wanted)?
            .ok_or(StoreError::InvalidInput("placeholder parcel vanished")),
    }
}

/// Links each owner to the house (else the building) carrying its house number.
fn import_house_links_tx(
    tx: &Transaction<'_>,
    fixtures: &FixtureSet,
    protocol_ids: &BTreeMap<String, i64>,
    report: &mut ImportReport,
) -> Result<(), StoreError> {
    for (key, owner) in &fixtures.owners {
        let Some(protocol_id) = protocol_ids.get(key.trim()).copied() else {
            continue;
        };
        let Some(house) = non_empty(owner.house_number.as_deref()) else {
            continue;
        };
        let parcel_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM parcels WHERE number = ?1 AND category IN (?2, ?3) \
                 ORDER BY category = ?3, id LIMIT 1",
                params![
                    house,
                    ParcelCategory::House.as_str(),
                    ParcelCategory::Structure.as_str()
                ],
                |row| row.get(0),
            )
            .optional()?;
        let Some(parcel_id) = parcel_id else {
            continue;
        };
        if link_parcel_tx(tx, protocol_id, parcel_id, Ownership::Actual)? {
            report.house_links += 1;
        }
    }
    Ok(())
}

fn import_persons_tx(
    tx: &Transaction<'_>,
    fixtures: &FixtureSet,
    protocol_ids: &BTreeMap<String, i64>,
    report: &mut ImportReport,
) -> Result<(), StoreError> {
    // person id -> index of the fixture record that was stored for it
    let mut accepted: BTreeMap<PersonId, usize> = BTreeMap::new();
    for (index, fixture) in fixtures.persons.iter().enumerate() {
        let Some(id) = fixture.person_id() else {
            tracing::warn!(id = fixture.id, "import: person with a non-positive id skipped");
            report.skipped_persons += 1;
            continue;
        };
        let name = fixture.name.trim();
        if name.is_empty() || accepted.contains_key(&id) {
            tracing::warn!(id = fixture.id, "import: person skipped (empty name or duplicate id)");
            report.skipped_persons += 1;
            continue;
        }
        let protocol_id = match fixture.protocol_key() {
            Some(key) => {
                let found = protocol_ids.get(key.as_str()).copied();
                if found.is_none() {
                    tracing::warn!(
                        id = fixture.id,
                        key = key.as_str(),
                        "import: person references an unknown protocol"
                    );
                }
                found
            }
            None => None,
        };
        tx.execute(
            "INSERT INTO persons(id, name, gender, house_number, birth_year, death_year, \
             protocol_id, notes) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.get(),
                name,
                fixture.gender().map(Gender::as_str),
                non_empty(fixture.house_number.as_deref()),
                fixture.birth_year(),
                fixture.death_year(),
                protocol_id,
                non_empty(fixture.notes.as_deref()),
            ],
        )?;
        accepted.insert(id, index);
        report.persons += 1;
    }
    let known: BTreeSet<PersonId> = accepted.keys().copied().collect();

    for (&id, &index) in &accepted {
        let fixture = &fixtures.persons[index];
        let parents = [
            ("father_id", fixture.father_id),
            ("mother_id", fixture.mother_id),
        ];
        for (column, parent) in parents {
            let Some(raw) = parent else {
                continue;
            };
            let resolved = PersonId::try_new(raw)
                .ok()
                .filter(|parent| *parent != id && known.contains(parent));
            let Some(parent) = resolved else {
                tracing::debug!(id = id.get(), parent = raw, column, "import: parent link dropped");
                report.dropped_parent_links += 1;
                continue;
            };
            tx.execute(
                &format!("UPDATE persons SET {column} = ?1 WHERE id = ?2"),
                params![parent.get(), id.get()],
            )?;
            report.parent_links += 1;
        }
    }

    let claims = accepted.iter().flat_map(|(&first, &index)| {
        fixtures.persons[index]
            .spouse_ids
            .iter()
            .filter_map(move |raw| Some((first, PersonId::try_new(*raw).ok()?)))
    });
    let marriages = MarriageSet::build(claims, &known);
    for rejected in marriages.rejected() {
        match rejected.reason {
            RejectedPairReason::SelfPair => tracing::warn!(
                person = rejected.first.get(),
                "import: self marriage rejected"
            ),
            RejectedPairReason::UnknownPerson(missing) => tracing::warn!(
                first = rejected.first.get(),
                second = rejected.second.get(),
                missing = missing.get(),
                "import: marriage with an unknown person rejected"
            ),
        }
    }
    report.rejected_marriages = marriages.rejected().len();
    for marriage in marriages.marriages() {
        tx.execute(
            "INSERT OR IGNORE INTO marriages(person_a, person_b) VALUES (?1, ?2)",
            params![marriage.a().get(), marriage.b().get()],
        )?;
        report.marriages += 1;
    }
    Ok(())
}
