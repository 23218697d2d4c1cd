#![forbid(unsafe_code)]

use super::demography::demography_all_tx;
use super::persons::persons_all_tx;
use super::*;
use kataster_core::model::{DemographyEntry, Ownership, ParcelCategory};
use kataster_core::stats::GenealogyStats;
use rusqlite::{Transaction, params};
use std::collections::BTreeMap;

/// Ranking tables keyed by `all_plots` and by category tag.
pub type Rankings = BTreeMap<String, Vec<RankingRow>>;

const ALL_PLOTS_RANKING: &str = "all_plots";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankingRow {
    pub owner_name: String,
    pub key: String,
    pub order_number: Option<i64>,
    pub plot_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolDay {
    /// ISO `YYYY-MM-DD`.
    pub date: String,
    pub count: u64,
    /// `(key, owner name)` ordered by name.
    pub owners: Vec<(String, String)>,
}

#[derive(Clone, Debug)]
pub struct Stats {
    pub total_owners: u64,
    pub total_plots: u64,
    pub protocols_per_day: Vec<ProtocolDay>,
    pub rankings_real: Rankings,
    pub rankings_protocol: Rankings,
    pub demography: Vec<DemographyEntry>,
    pub category_counts: BTreeMap<String, u64>,
    pub genealogy: GenealogyStats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub total_owners: u64,
    pub total_objects: u64,
    pub total_persons: u64,
    pub total_demography: u64,
}

impl SqliteStore {
    pub fn stats(&mut self) -> Result<Stats, StoreError> {
        let tx = self.conn.transaction()?;
        let total_owners = count_tx(&tx, "protocols")?;
        let total_plots = count_tx(&tx, "parcels")?;
        let protocols_per_day = protocols_per_day_tx(&tx)?;
        let rankings_real = rankings_tx(&tx, Ownership::Actual)?;
        let rankings_protocol = rankings_tx(&tx, Ownership::Protocol)?;
        let demography = demography_all_tx(&tx)?;
        let category_counts = category_counts_tx(&tx)?;
        let persons = persons_all_tx(&tx)?;
        tx.commit()?;

        Ok(Stats {
            total_owners,
            total_plots,
            protocols_per_day,
            rankings_real,
            rankings_protocol,
            demography,
            category_counts,
            genealogy: GenealogyStats::from_persons(&persons),
        })
    }

    pub fn dashboard_counts(&mut self) -> Result<DashboardCounts, StoreError> {
        let tx = self.conn.transaction()?;
        let counts = DashboardCounts {
            total_owners: count_tx(&tx, "protocols")?,
            total_objects: count_tx(&tx, "parcels")?,
            total_persons: count_tx(&tx, "persons")?,
            total_demography: count_tx(&tx, "demography")?,
        };
        tx.commit()?;
        Ok(counts)
    }
}

fn count_tx(tx: &Transaction<'_>, table: &'static str) -> Result<u64, StoreError> {
    let count: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn protocols_per_day_tx(tx: &Transaction<'_>) -> Result<Vec<ProtocolDay>, StoreError> {
    let mut stmt = tx.prepare(
        "SELECT protocol_date, key, owner_name FROM protocols \
         WHERE protocol_date IS NOT NULL ORDER BY protocol_date, owner_name, id",
    )?;
    let mut rows = stmt.query([])?;
    let mut out: Vec<ProtocolDay> = Vec::new();
    while let Some(row) = rows.next()? {
        let date: String = row.get(0)?;
        let key: String = row.get(1)?;
        let name: String = row.get(2)?;
        match out.last_mut() {
            Some(day) if day.date == date => {
                day.count += 1;
                day.owners.push((key, name));
            }
            _ => out.push(ProtocolDay {
                date,
                count: 1,
                owners: vec![(key, name)],
            }),
        }
    }
    Ok(out)
}

fn rankings_tx(tx: &Transaction<'_>, ownership: Ownership) -> Result<Rankings, StoreError> {
    let mut out = Rankings::new();
    out.insert(
        ALL_PLOTS_RANKING.to_string(),
        ranking_tx(tx, ownership, None)?,
    );
    for category in ParcelCategory::RANKED {
        out.insert(
            category.as_str().to_string(),
            ranking_tx(tx, ownership, Some(category))?,
        );
    }
    Ok(out)
}

/// Owners holding at least one matching parcel, most parcels first.
fn ranking_tx(
    tx: &Transaction<'_>,
    ownership: Ownership,
    category: Option<ParcelCategory>,
) -> Result<Vec<RankingRow>, StoreError> {
    let mut stmt = tx.prepare_cached(
        "SELECT pr.owner_name, pr.key, pr.order_number, COUNT(po.parcel_id) AS plot_count \
         FROM protocols pr \
         JOIN parcel_owners po ON po.protocol_id = pr.id \
         JOIN parcels p ON p.id = po.parcel_id \
         WHERE po.ownership = ?1 AND (?2 IS NULL OR p.category = ?2) \
         GROUP BY pr.id \
         HAVING plot_count > 0 \
         ORDER BY plot_count DESC, pr.owner_name, pr.id",
    )?;
    let mut rows = stmt.query(params![ownership.as_str(), category.map(ParcelCategory::as_str)])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let plot_count: i64 = row.get(3)?;
        out.push(RankingRow {
            owner_name: row.get(0)?,
            key: row.get(1)?,
            order_number: row.get(2)?,
            plot_count: u64::try_from(plot_count).unwrap_or(0),
        });
    }
    Ok(out)
}

fn category_counts_tx(tx: &Transaction<'_>) -> Result<BTreeMap<String, u64>, StoreError> {
    let mut stmt = tx.prepare("SELECT category, COUNT(*) FROM parcels GROUP BY category")?;
    let mut rows = stmt.query([])?;
    let mut out = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let category: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        out.insert(category, u64::try_from(count).unwrap_or(0));
    }
    Ok(out)
}
