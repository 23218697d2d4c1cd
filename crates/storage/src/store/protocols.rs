#![forbid(unsafe_code)]

use super::*;
use kataster_core::dates::{format_iso_date, parse_iso_date};
use kataster_core::ids::ProtocolKey;
use kataster_core::links::{ProtocolGraph, nl2br, render_relations_html};
use kataster_core::model::{Ownership, ParcelCategory, Protocol, ProtocolDraft, non_empty};
use kataster_core::stats::compare_parcel_numbers;
use rusqlite::{OptionalExtension, Transaction, params};
use std::collections::{BTreeMap, BTreeSet};

const PROTOCOL_COLUMNS: &str = "id, key, owner_name, order_number, house_number, genealogy, \
     ownership_history, remarks, co_ownership, relations, interpretation, protocol_date, \
     protocol_location";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlotLink {
    pub id: i64,
    pub number: String,
    pub category: ParcelCategory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedPlot {
    pub plot: PlotLink,
    pub ownership: Ownership,
}

#[derive(Clone, Debug)]
pub struct ProtocolSummary {
    pub id: i64,
    pub key: ProtocolKey,
    pub owner_name: String,
    pub order_number: Option<i64>,
    pub actual_plots: Vec<PlotLink>,
    pub protocol_plots: Vec<PlotLink>,
}

#[derive(Clone, Debug)]
pub struct ProtocolsOverview {
    pub owners: Vec<ProtocolSummary>,
    pub order_min: i64,
    pub order_max: i64,
}

#[derive(Clone, Debug)]
pub struct ProtocolDetail {
    pub protocol: Protocol,
    pub has_family_tree: bool,
    pub protocol_plots: Vec<PlotLink>,
    pub actual_plots: Vec<PlotLink>,
    pub all_plots: Vec<OwnedPlot>,
    /// Linked house or building whose number matches the protocol's house number.
    pub house_parcel_id: Option<i64>,
    pub relations_html: String,
    pub full_history: String,
    pub genealogy_html: String,
    pub co_ownership_html: String,
    pub interpretation_html: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolKeyRow {
    pub key: ProtocolKey,
    pub name: String,
    pub order_number: Option<i64>,
}

/// Replacement parcel links for a protocol. A parcel in both sets is kept
/// as an actual holding only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlotSelection {
    pub actual: BTreeSet<i64>,
    pub protocol: BTreeSet<i64>,
}

impl SqliteStore {
    pub fn protocols_overview(&mut self) -> Result<ProtocolsOverview, StoreError> {
        let tx = self.conn.transaction()?;
        let protocols = protocols_all_tx(&tx)?;
        let mut plots = owned_plots_by_protocol_tx(&tx)?;

        let mut owners = Vec::with_capacity(protocols.len());
        for protocol in protocols {
            let owned = plots.remove(&protocol.id).unwrap_or_default();
            let (actual_plots, protocol_plots) = split_by_ownership(owned);
            owners.push(ProtocolSummary {
                id: protocol.id,
                key: protocol.key,
                owner_name: protocol.owner_name,
                order_number: protocol.order_number,
                actual_plots,
                protocol_plots,
            });
        }

        let (order_min, order_max): (Option<i64>, Option<i64>) = tx.query_row(
            "SELECT MIN(order_number), MAX(order_number) FROM protocols WHERE order_number IS NOT NULL",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        tx.commit()?;

        Ok(ProtocolsOverview {
            owners,
            order_min: order_min.unwrap_or(1),
            order_max: order_max.unwrap_or(1),
        })
    }

    pub fn protocol_detail(&mut self, key: &str) -> Result<ProtocolDetail, StoreError> {
        let tx = self.conn.transaction()?;
        let Some(protocol) = protocol_by_key_tx(&tx, key)? else {
            return Err(StoreError::UnknownProtocol(key.to_string()));
        };
        let has_family_tree: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM persons WHERE protocol_id = ?1)",
            params![protocol.id],
            |row| row.get(0),
        )?;
        let all_plots = owned_plots_tx(&tx, protocol.id)?;
        tx.commit()?;

        let (actual_plots, protocol_plots) = split_by_ownership(all_plots.clone());
        let house_parcel_id = protocol.house_number.as_deref().and_then(|house| {
            all_plots
                .iter()
                .find(|owned| owned.plot.category.is_dwelling() && owned.plot.number == house)
                .map(|owned| owned.plot.id)
        });

        let text = |value: &Option<String>| nl2br(value.as_deref().unwrap_or(""));
        let history = text(&protocol.ownership_history);
        let full_history = match protocol.remarks.as_deref().map(str::trim) {
            Some(remarks) if !remarks.is_empty() => format!(
                "{history}<hr><b>Ciąg dalszy / Uwagi:</b><br>{}",
                nl2br(remarks)
            ),
            _ => history,
        };

        Ok(ProtocolDetail {
            has_family_tree,
            protocol_plots,
            actual_plots,
            house_parcel_id,
            relations_html: render_relations_html(protocol.relations.as_deref().unwrap_or("")),
            full_history,
            genealogy_html: text(&protocol.genealogy),
            co_ownership_html: text(&protocol.co_ownership),
            interpretation_html: text(&protocol.interpretation),
            all_plots,
            protocol,
        })
    }

    pub fn protocol_graph(&mut self) -> Result<ProtocolGraph, StoreError> {
        let tx = self.conn.transaction()?;
        let protocols = protocols_all_tx(&tx)?;
        tx.commit()?;
        Ok(ProtocolGraph::build(&protocols))
    }

    pub fn protocols_list(&mut self) -> Result<Vec<Protocol>, StoreError> {
        let tx = self.conn.transaction()?;
        let protocols = protocols_all_tx(&tx)?;
        tx.commit()?;
        Ok(protocols)
    }

    pub fn protocol_get(&mut self, id: i64) -> Result<(Protocol, Vec<OwnedPlot>), StoreError> {
        let tx = self.conn.transaction()?;
        let protocol = protocol_by_id_tx(&tx, id)?;
        let plots = owned_plots_tx(&tx, id)?;
        tx.commit()?;
        Ok((protocol, plots))
    }

    pub fn protocol_create(&mut self, draft: &ProtocolDraft) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let id = insert_protocol_tx(&tx, draft)?;
        tx.commit()?;
        Ok(id)
    }

    /// Updates the fields and, when `plots` is given, replaces every parcel link.
    pub fn protocol_update(
        &mut self,
        id: i64,
        draft: &ProtocolDraft,
        plots: Option<&PlotSelection>,
    ) -> Result<(), StoreError> {
        let key = validate_draft(draft)?;
        let tx = self.conn.transaction()?;
        protocol_by_id_tx(&tx, id)?;

        tx.execute(
            "UPDATE protocols SET key = ?1, owner_name = ?2, order_number = ?3, house_number = ?4, \
             genealogy = ?5, ownership_history = ?6, remarks = ?7, co_ownership = ?8, \
             relations = ?9, interpretation = ?10, protocol_date = ?11, protocol_location = ?12 \
             WHERE id = ?13",
            params![
                key.as_str(),
                draft.owner_name.trim(),
                draft.order_number,
                non_empty(draft.house_number.as_deref()),
                non_empty(draft.genealogy.as_deref()),
                non_empty(draft.ownership_history.as_deref()),
                non_empty(draft.remarks.as_deref()),
                non_empty(draft.co_ownership.as_deref()),
                non_empty(draft.relations.as_deref()),
                non_empty(draft.interpretation.as_deref()),
                draft.protocol_date.map(format_iso_date),
                non_empty(draft.protocol_location.as_deref()),
                id,
            ],
        )
        .map_err(|err| map_unique_conflict(err, || format!("protocol key {key}")))?;

        if let Some(plots) = plots {
            tx.execute(
                "DELETE FROM parcel_owners WHERE protocol_id = ?1",
                params![id],
            )?;
            for parcel_id in plots.actual.iter().chain(plots.protocol.iter()) {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM parcels WHERE id = ?1)",
                    params![parcel_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StoreError::UnknownParcel(*parcel_id));
                }
            }
            for parcel_id in &plots.actual {
                link_parcel_tx(&tx, id, *parcel_id, Ownership::Actual)?;
            }
            for parcel_id in plots.protocol.difference(&plots.actual) {
                link_parcel_tx(&tx, id, *parcel_id, Ownership::Protocol)?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn protocol_delete(&mut self, id: i64) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM protocols WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::UnknownProtocol(id.to_string()));
        }
        tx.commit()?;
        Ok(())
    }

    pub fn protocol_keys(&mut self) -> Result<Vec<ProtocolKeyRow>, StoreError> {
        let tx = self.conn.transaction()?;
        let mut out = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT key, owner_name, order_number FROM protocols \
                 ORDER BY order_number IS NULL, order_number, id",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let key: String = row.get(0)?;
                out.push(ProtocolKeyRow {
                    key: stored_key(&key)?,
                    name: row.get(1)?,
                    order_number: row.get(2)?,
                });
            }
        }
        tx.commit()?;
        Ok(out)
    }
}

fn stored_key(raw: &str) -> Result<ProtocolKey, StoreError> {
    ProtocolKey::try_new(raw).map_err(|_| StoreError::InvalidInput("stored protocol key is invalid"))
}

fn validate_draft(draft: &ProtocolDraft) -> Result<ProtocolKey, StoreError> {
    let Some(key) = draft.key.clone() else {
        return Err(StoreError::InvalidInput("protocol key is required"));
    };
    if draft.owner_name.trim().is_empty() {
        return Err(StoreError::InvalidInput("owner name is required"));
    }
    if draft.order_number.is_some_and(|n| n < 0) {
        return Err(StoreError::InvalidInput("order number must not be negative"));
    }
    Ok(key)
}

fn protocol_from_row(row: &Row<'_>) -> rusqlite::Result<Protocol> {
    let key: String = row.get(1)?;
    let key = ProtocolKey::try_new(key).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(err))
    })?;
    let date: Option<String> = row.get(11)?;
    Ok(Protocol {
        id: row.get(0)?,
        key,
        owner_name: row.get(2)?,
        order_number: row.get(3)?,
        house_number: row.get(4)?,
        genealogy: row.get(5)?,
        ownership_history: row.get(6)?,
        remarks: row.get(7)?,
        co_ownership: row.get(8)?,
        relations: row.get(9)?,
        interpretation: row.get(10)?,
        protocol_date: date.as_deref().and_then(parse_iso_date),
        protocol_location: row.get(12)?,
    })
}

pub(super) fn protocols_all_tx(tx: &Transaction<'_>) -> Result<Vec<Protocol>, StoreError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {PROTOCOL_COLUMNS} FROM protocols ORDER BY order_number IS NULL, order_number, id"
    ))?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(protocol_from_row(row)?);
    }
    Ok(out)
}

fn protocol_by_key_tx(tx: &Transaction<'_>, key: &str) -> Result<Option<Protocol>, StoreError> {
    Ok(tx
        .query_row(
            &format!("SELECT {PROTOCOL_COLUMNS} FROM protocols WHERE key = ?1"),
            params![key.trim()],
            protocol_from_row,
        )
        .optional()?)
}

fn protocol_by_id_tx(tx: &Transaction<'_>, id: i64) -> Result<Protocol, StoreError> {
    tx.query_row(
        &format!("SELECT {PROTOCOL_COLUMNS} FROM protocols WHERE id = ?1"),
        params![id],
        protocol_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::UnknownProtocol(id.to_string()))
}

pub(super) fn protocol_id_by_key_tx(
    tx: &Transaction<'_>,
    key: &str,
) -> Result<Option<i64>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT id FROM protocols WHERE key = ?1",
            params![key.trim()],
            |row| row.get(0),
        )
        .optional()?)
}

pub(super) fn insert_protocol_tx(
    tx: &Transaction<'_>,
    draft: &ProtocolDraft,
) -> Result<i64, StoreError> {
    let key = validate_draft(draft)?;
    tx.execute(
        "INSERT INTO protocols(key, owner_name, order_number, house_number, genealogy, \
         ownership_history, remarks, co_ownership, relations, interpretation, protocol_date, \
         protocol_location) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            key.as_str(),
            draft.owner_name.trim(),
            draft.order_number,
            non_empty(draft.house_number.as_deref()),
            non_empty(draft.genealogy.as_deref()),
            non_empty(draft.ownership_history.as_deref()),
            non_empty(draft.remarks.as_deref()),
            non_empty(draft.co_ownership.as_deref()),
            non_empty(draft.relations.as_deref()),
            non_empty(draft.interpretation.as_deref()),
            draft.protocol_date.map(format_iso_date),
            non_empty(draft.protocol_location.as_deref()),
        ],
    )
    .map_err(|err| map_unique_conflict(err, || format!("protocol key {key}")))?;
    Ok(tx.last_insert_rowid())
}

/// Returns whether a new link was written.
pub(super) fn link_parcel_tx(
    tx: &Transaction<'_>,
    protocol_id: i64,
    parcel_id: i64,
    ownership: Ownership,
) -> Result<bool, StoreError> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO parcel_owners(protocol_id, parcel_id, ownership) VALUES (?1, ?2, ?3)",
        params![protocol_id, parcel_id, ownership.as_str()],
    )?;
    Ok(inserted > 0)
}

fn owned_plot_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, OwnedPlot)> {
    let category: String = row.get(3)?;
    let category = ParcelCategory::parse(&category).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown parcel category {category}").into(),
        )
    })?;
    let ownership: String = row.get(4)?;
    let ownership = Ownership::parse(&ownership).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown ownership {ownership}").into(),
        )
    })?;
    Ok((
        row.get(0)?,
        OwnedPlot {
            plot: PlotLink {
                id: row.get(1)?,
                number: row.get(2)?,
                category,
            },
            ownership,
        },
    ))
}

fn owned_plots_tx(tx: &Transaction<'_>, protocol_id: i64) -> Result<Vec<OwnedPlot>, StoreError> {
    let mut stmt = tx.prepare(
        "SELECT po.protocol_id, p.id, p.number, p.category, po.ownership \
         FROM parcel_owners po JOIN parcels p ON p.id = po.parcel_id \
         WHERE po.protocol_id = ?1",
    )?;
    let mut rows = stmt.query(params![protocol_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(owned_plot_from_row(row)?.1);
    }
    sort_owned(&mut out);
    Ok(out)
}

fn owned_plots_by_protocol_tx(
    tx: &Transaction<'_>,
) -> Result<BTreeMap<i64, Vec<OwnedPlot>>, StoreError> {
    let mut stmt = tx.prepare(
        "SELECT po.protocol_id, p.id, p.number, p.category, po.ownership \
         FROM parcel_owners po JOIN parcels p ON p.id = po.parcel_id",
    )?;
    let mut rows = stmt.query([])?;
    let mut out: BTreeMap<i64, Vec<OwnedPlot>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let (protocol_id, owned) = owned_plot_from_row(row)?;
        out.entry(protocol_id).or_default().push(owned);
    }
    for owned in out.values_mut() {
        sort_owned(owned);
    }
    Ok(out)
}

fn sort_owned(plots: &mut [OwnedPlot]) {
    plots.sort_by(|a, b| {
        compare_parcel_numbers(&a.plot.number, &b.plot.number)
            .then_with(|| a.plot.id.cmp(&b.plot.id))
            .then_with(|| a.ownership.cmp(&b.ownership))
    });
}

fn split_by_ownership(plots: Vec<OwnedPlot>) -> (Vec<PlotLink>, Vec<PlotLink>) {
    let mut actual = Vec::new();
    let mut declared = Vec::new();
    for owned in plots {
        match owned.ownership {
            Ownership::Actual => actual.push(owned.plot),
            Ownership::Protocol => declared.push(owned.plot),
        }
    }
    (actual, declared)
}
