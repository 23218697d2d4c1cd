#![forbid(unsafe_code)]

use super::{ApiResult, Reply, parse_body};
use crate::http::ApiError;
use crate::time::now_rfc3339;
use kataster_storage::{
    OwnedPlot, PlotLink, ProtocolDay, RankingRow, Rankings, SqliteStore, StoreError,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

pub(super) fn route(
    store: &mut SqliteStore,
    method: &str,
    rest: &[&str],
    body: &[u8],
) -> ApiResult {
    match (method, rest) {
        ("GET", ["health"]) => Ok(Reply::ok(json!({
            "ok": true,
            "generated_at": now_rfc3339(),
        }))),
        ("GET", ["protocols"]) => protocols_overview(store),
        ("GET", ["protocols", key]) => protocol_detail(store, key),
        ("GET", ["parcels"]) => Ok(Reply::ok(store.parcels_feature_collection()?)),
        ("POST", ["plots-for-owners"]) => plots_for_owners(store, body),
        ("GET", ["genealogy", "full-graph"]) => {
            Ok(Reply::ok(to_json(&store.population_graph()?)?))
        }
        ("GET", ["genealogy", key]) => Ok(Reply::ok(to_json(&store.family_tree(key)?)?)),
        ("GET", ["protocol-graph"]) => Ok(Reply::ok(to_json(&store.protocol_graph()?)?)),
        ("GET", ["stats"]) => stats(store),
        (
            _,
            ["health"]
            | ["protocols"]
            | ["protocols", _]
            | ["parcels"]
            | ["plots-for-owners"]
            | ["genealogy", _]
            | ["protocol-graph"]
            | ["stats"],
        ) => Err(ApiError::method_not_allowed()),
        _ => Err(ApiError::not_found()),
    }
}

pub(super) fn to_json(value: &impl serde::Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|err| StoreError::Json(err).into())
}

fn plot_json(plot: &PlotLink) -> Value {
    json!({
        "id": plot.id,
        "number": plot.number,
        "category": plot.category.as_str(),
    })
}

pub(super) fn owned_plot_json(owned: &OwnedPlot) -> Value {
    json!({
        "id": owned.plot.id,
        "number": owned.plot.number,
        "category": owned.plot.category.as_str(),
        "ownership": owned.ownership.as_str(),
    })
}

fn protocols_overview(store: &mut SqliteStore) -> ApiResult {
    let overview = store.protocols_overview()?;
    let owners: Vec<Value> = overview
        .owners
        .iter()
        .map(|owner| {
            json!({
                "id": owner.id,
                "key": owner.key,
                "owner_name": owner.owner_name,
                "order_number": owner.order_number,
                "actual_plots": owner.actual_plots.iter().map(plot_json).collect::<Vec<_>>(),
                "protocol_plots": owner.protocol_plots.iter().map(plot_json).collect::<Vec<_>>(),
            })
        })
        .collect();
    Ok(Reply::ok(json!({
        "owners": owners,
        "metadata": {
            "total_count": overview.owners.len(),
            "order_range": { "min": overview.order_min, "max": overview.order_max },
        },
    })))
}

fn protocol_detail(store: &mut SqliteStore, key: &str) -> ApiResult {
    let detail = store.protocol_detail(key)?;
    Ok(Reply::ok(json!({
        "protocol": to_json(&detail.protocol)?,
        "has_family_tree": detail.has_family_tree,
        "protocol_plots": detail.protocol_plots.iter().map(plot_json).collect::<Vec<_>>(),
        "actual_plots": detail.actual_plots.iter().map(plot_json).collect::<Vec<_>>(),
        "all_plots": detail.all_plots.iter().map(owned_plot_json).collect::<Vec<_>>(),
        "house_parcel_id": detail.house_parcel_id,
        "relations_html": detail.relations_html,
        "full_history": detail.full_history,
        "genealogy_html": detail.genealogy_html,
        "co_ownership_html": detail.co_ownership_html,
        "interpretation_html": detail.interpretation_html,
    })))
}

#[derive(Deserialize)]
struct OwnerIds {
    #[serde(default)]
    owner_ids: Vec<i64>,
}

fn plots_for_owners(store: &mut SqliteStore, body: &[u8]) -> ApiResult {
    let request: OwnerIds = parse_body(body)?;
    let owners: Vec<Value> = store
        .plots_for_owners(&request.owner_ids)?
        .into_iter()
        .map(|owner| {
            json!({
                "owner_id": owner.owner_id,
                "owner_name": owner.owner_name,
                "features": owner.features,
            })
        })
        .collect();
    Ok(Reply::ok(Value::Array(owners)))
}

fn ranking_json(rankings: &Rankings) -> Value {
    let tables: Map<String, Value> = rankings
        .iter()
        .map(|(name, rows)| {
            let rows: Vec<Value> = rows.iter().map(ranking_row_json).collect();
            (name.clone(), Value::Array(rows))
        })
        .collect();
    Value::Object(tables)
}

fn ranking_row_json(row: &RankingRow) -> Value {
    json!({
        "owner_name": row.owner_name,
        "key": row.key,
        "order_number": row.order_number,
        "plot_count": row.plot_count,
    })
}

fn protocol_day_json(day: &ProtocolDay) -> Value {
    let owners: Vec<Value> = day
        .owners
        .iter()
        .map(|(key, name)| json!({ "key": key, "name": name }))
        .collect();
    json!({
        "date": day.date,
        "count": day.count,
        "owners": owners,
    })
}

fn stats(store: &mut SqliteStore) -> ApiResult {
    let stats = store.stats()?;
    Ok(Reply::ok(json!({
        "general_stats": {
            "total_owners": stats.total_owners,
            "total_plots": stats.total_plots,
        },
        "protocols_per_day": stats.protocols_per_day.iter().map(protocol_day_json).collect::<Vec<_>>(),
        "rankings_real": ranking_json(&stats.rankings_real),
        "rankings_protocol": ranking_json(&stats.rankings_protocol),
        "demography": to_json(&stats.demography)?,
        "category_counts": stats.category_counts,
        "genealogy_stats": to_json(&stats.genealogy)?,
    })))
}
