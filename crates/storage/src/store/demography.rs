#![forbid(unsafe_code)]

use super::*;
use kataster_core::model::{DemographyEntry, DemographyInput, non_empty};
use rusqlite::{Transaction, params};

impl SqliteStore {
    pub fn demography_list(&mut self) -> Result<Vec<DemographyEntry>, StoreError> {
        let tx = self.conn.transaction()?;
        let entries = demography_all_tx(&tx)?;
        tx.commit()?;
        Ok(entries)
    }

    pub fn demography_create(&mut self, input: &DemographyInput) -> Result<i64, StoreError> {
        validate_demography(input)?;
        let tx = self.conn.transaction()?;
        let id = insert_demography_tx(&tx, input)?;
        tx.commit()?;
        Ok(id)
    }

    pub fn demography_update(&mut self, id: i64, input: &DemographyInput) -> Result<(), StoreError> {
        validate_demography(input)?;
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE demography SET year = ?1, population_total = ?2, catholics = ?3, jews = ?4, \
             others = ?5, description = ?6 WHERE id = ?7",
            params![
                input.year,
                input.population_total,
                input.catholics,
                input.jews,
                input.others,
                non_empty(input.description.as_deref()),
                id,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::UnknownDemography(id));
        }
        tx.commit()?;
        Ok(())
    }

    pub fn demography_delete(&mut self, id: i64) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM demography WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::UnknownDemography(id));
        }
        tx.commit()?;
        Ok(())
    }
}

fn validate_demography(input: &DemographyInput) -> Result<(), StoreError> {
    let counts = [input.population_total, input.catholics, input.jews, input.others];
    if counts.iter().flatten().any(|count| *count < 0) {
        return Err(StoreError::InvalidInput("population counts must not be negative"));
    }
    Ok(())
}

pub(super) fn insert_demography_tx(
    tx: &Transaction<'_>,
    input: &DemographyInput,
) -> Result<i64, StoreError> {
    validate_demography(input)?;
    tx.execute(
        "INSERT INTO demography(year, population_total, catholics, jews, others, description) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            input.year,
            input.population_total,
            input.catholics,
            input.jews,
            input.others,
            non_empty(input.description.as_deref()),
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Chronological; entries sharing a year keep insertion order.
pub(super) fn demography_all_tx(tx: &Transaction<'_>) -> Result<Vec<DemographyEntry>, StoreError> {
    let mut stmt = tx.prepare(
        "SELECT id, year, population_total, catholics, jews, others, description \
         FROM demography ORDER BY year, id",
    )?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(DemographyEntry {
            id: row.get(0)?,
            values: DemographyInput {
                year: row.get(1)?,
                population_total: row.get(2)?,
                catholics: row.get(3)?,
                jews: row.get(4)?,
                others: row.get(5)?,
                description: row.get(6)?,
            },
        });
    }
    Ok(out)
}
