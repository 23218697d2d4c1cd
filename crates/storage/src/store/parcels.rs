#![forbid(unsafe_code)]

use super::*;
use kataster_core::geometry::Geometry;
use kataster_core::model::ParcelCategory;
use kataster_core::stats::compare_parcel_numbers;
use rusqlite::{OptionalExtension, Transaction, params, params_from_iter};
use serde_json::{Value, json};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParcelAdminRow {
    pub id: i64,
    pub number: String,
    pub category: ParcelCategory,
    pub is_linked: bool,
}

#[derive(Clone, Debug)]
pub struct OwnerFeatures {
    pub owner_id: i64,
    pub owner_name: String,
    pub features: Vec<Value>,
}

impl SqliteStore {
    /// GeoJSON `FeatureCollection` of every parcel that has geometry.
    pub fn parcels_feature_collection(&mut self) -> Result<Value, StoreError> {
        let tx = self.conn.transaction()?;

        let mut owners: BTreeMap<i64, Vec<Value>> = BTreeMap::new();
        {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT po.parcel_id, pr.id, pr.key, pr.owner_name \
                 FROM parcel_owners po JOIN protocols pr ON pr.id = po.protocol_id \
                 ORDER BY po.parcel_id, pr.id",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let parcel_id: i64 = row.get(0)?;
                let id: i64 = row.get(1)?;
                let key: String = row.get(2)?;
                let name: String = row.get(3)?;
                owners
                    .entry(parcel_id)
                    .or_default()
                    .push(json!({"id": id, "key": key, "name": name}));
            }
        }

        let mut features = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT id, number, category, geometry_json FROM parcels \
                 WHERE geometry_json IS NOT NULL ORDER BY id",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let number: String = row.get(1)?;
                let category: String = row.get(2)?;
                let geometry: String = row.get(3)?;
                let parcel_owners = owners.remove(&id);
                features.push(json!({
                    "type": "Feature",
                    "id": id,
                    "geometry": serde_json::from_str::<Value>(&geometry)?,
                    "properties": {
                        "number": number,
                        "category": category,
                        "owners": parcel_owners,
                    },
                }));
            }
        }
        tx.commit()?;

        Ok(json!({"type": "FeatureCollection", "features": features}))
    }

    /// Features of every owner in `owner_ids` that holds at least one mapped parcel.
    pub fn plots_for_owners(&mut self, owner_ids: &[i64]) -> Result<Vec<OwnerFeatures>, StoreError> {
        if owner_ids.is_empty() {
            return Ok(Vec::new());
        }
        let tx = self.conn.transaction()?;
        let mut by_owner: BTreeMap<i64, OwnerFeatures> = BTreeMap::new();
        for chunk in owner_ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT pr.id, pr.owner_name, p.id, p.number, p.category, p.geometry_json \
                 FROM protocols pr \
                 JOIN parcel_owners po ON po.protocol_id = pr.id \
                 JOIN parcels p ON p.id = po.parcel_id \
                 WHERE pr.id IN ({}) AND p.geometry_json IS NOT NULL \
                 ORDER BY pr.id, p.id",
                placeholders(chunk.len())
            );
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let owner_id: i64 = row.get(0)?;
                let owner_name: String = row.get(1)?;
                let parcel_id: i64 = row.get(2)?;
                let number: String = row.get(3)?;
                let category: String = row.get(4)?;
                let geometry: String = row.get(5)?;
                let entry = by_owner.entry(owner_id).or_insert_with(|| OwnerFeatures {
                    owner_id,
                    owner_name,
                    features: Vec::new(),
                });
                // One parcel may be held both actually and by protocol.
                if entry
                    .features
                    .iter()
                    .any(|f| f.get("id").and_then(Value::as_i64) == Some(parcel_id))
                {
                    continue;
                }
                entry.features.push(json!({
                    "type": "Feature",
                    "id": parcel_id,
                    "geometry": serde_json::from_str::<Value>(&geometry)?,
                    "properties": {"number": number, "category": category},
                }));
            }
        }
        tx.commit()?;
        Ok(by_owner.into_values().collect())
    }

    pub fn parcels_list(&mut self) -> Result<Vec<ParcelAdminRow>, StoreError> {
        let tx = self.conn.transaction()?;
        let mut out = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT p.id, p.number, p.category, \
                 EXISTS(SELECT 1 FROM parcel_owners po WHERE po.parcel_id = p.id) \
                 FROM parcels p",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let category: String = row.get(2)?;
                out.push(ParcelAdminRow {
                    id: row.get(0)?,
                    number: row.get(1)?,
                    category: stored_category(&category)?,
                    is_linked: row.get(3)?,
                });
            }
        }
        tx.commit()?;
        out.sort_by(|a, b| compare_parcel_numbers(&a.number, &b.number).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    pub fn parcel_update(
        &mut self,
        id: i64,
        number: &str,
        category: ParcelCategory,
    ) -> Result<(), StoreError> {
        let number = number.trim();
        if number.is_empty() {
            return Err(StoreError::InvalidInput("parcel number must not be empty"));
        }
        let tx = self.conn.transaction()?;
        let updated = tx
            .execute(
                "UPDATE parcels SET number = ?1, category = ?2 WHERE id = ?3",
                params![number, category.as_str(), id],
            )
            .map_err(|err| {
                map_unique_conflict(err, || format!("parcel {number} ({})", category.as_str()))
            })?;
        if updated == 0 {
            return Err(StoreError::UnknownParcel(id));
        }
        tx.commit()?;
        Ok(())
    }

    pub fn parcel_delete(&mut self, id: i64) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM parcels WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::UnknownParcel(id));
        }
        tx.commit()?;
        Ok(())
    }
}

fn stored_category(raw: &str) -> Result<ParcelCategory, StoreError> {
    ParcelCategory::parse(raw).ok_or(StoreError::InvalidInput("stored parcel category is invalid"))
}

/// Inserts unless `(number, category)` already exists; returns the new id.
pub(super) fn insert_parcel_tx(
    tx: &Transaction<'_>,
    number: &str,
    category: ParcelCategory,
    geometry: Option<&Geometry>,
) -> Result<Option<i64>, StoreError> {
    let geometry_json = geometry
        .map(|g| serde_json::to_string(&g.to_geojson()))
        .transpose()?;
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO parcels(number, category, geometry_json) VALUES (?1, ?2, ?3)",
        params![number, category.as_str(), geometry_json],
    )?;
    if inserted == 0 {
        return Ok(None);
    }
    Ok(Some(tx.last_insert_rowid()))
}

pub(super) fn parcel_id_tx(
    tx: &Transaction<'_>,
    number: &str,
    category: ParcelCategory,
) -> Result<Option<i64>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT id FROM parcels WHERE number = ?1 AND category = ?2",
            params![number, category.as_str()],
            |row| row.get(0),
        )
        .optional()?)
}
