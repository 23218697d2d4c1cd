#![forbid(unsafe_code)]

use super::public::{owned_plot_json, to_json};
use super::{ApiResult, Reply, parse_body, parse_id};
use crate::http::ApiError;
use kataster_core::ids::PersonId;
use kataster_core::model::{DemographyInput, ParcelCategory, PersonInput, ProtocolDraft};
use kataster_storage::{PlotSelection, SqliteStore};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;

pub(super) fn route(
    store: &mut SqliteStore,
    method: &str,
    rest: &[&str],
    body: &[u8],
) -> ApiResult {
    match (method, rest) {
        ("GET", ["dashboard-stats"]) => {
            let counts = store.dashboard_counts()?;
            Ok(Reply::ok(json!({
                "total_owners": counts.total_owners,
                "total_objects": counts.total_objects,
                "total_persons": counts.total_persons,
                "total_demography": counts.total_demography,
            })))
        }

        ("GET", ["protocols"]) => Ok(Reply::ok(to_json(&store.protocols_list()?)?)),
        ("POST", ["protocols"]) => {
            let draft: ProtocolDraft = parse_body(body)?;
            Ok(Reply::created(store.protocol_create(&draft)?))
        }
        ("GET", ["protocols", id]) => {
            let (protocol, plots) = store.protocol_get(parse_id(id)?)?;
            Ok(Reply::ok(json!({
                "protocol": to_json(&protocol)?,
                "plots": plots.iter().map(owned_plot_json).collect::<Vec<_>>(),
            })))
        }
        ("PUT", ["protocols", id]) => {
            let id = parse_id(id)?;
            let payload: ProtocolPayload = parse_body(body)?;
            let selection = payload.plots.map(PlotsPayload::into_selection);
            store.protocol_update(id, &payload.draft, selection.as_ref())?;
            Ok(Reply::success())
        }
        ("DELETE", ["protocols", id]) => {
            store.protocol_delete(parse_id(id)?)?;
            Ok(Reply::success())
        }
        ("GET", ["protocol-keys"]) => {
            let keys: Vec<Value> = store
                .protocol_keys()?
                .into_iter()
                .map(|row| {
                    json!({
                        "key": row.key,
                        "name": row.name,
                        "orderNumber": row.order_number,
                    })
                })
                .collect();
            Ok(Reply::ok(Value::Array(keys)))
        }

        ("GET", ["parcels"]) => {
            let rows: Vec<Value> = store
                .parcels_list()?
                .into_iter()
                .map(|row| {
                    json!({
                        "id": row.id,
                        "number": row.number,
                        "category": row.category.as_str(),
                        "is_linked": row.is_linked,
                    })
                })
                .collect();
            Ok(Reply::ok(Value::Array(rows)))
        }
        ("PUT", ["parcels", id]) => {
            let id = parse_id(id)?;
            let payload: ParcelPayload = parse_body(body)?;
            store.parcel_update(id, &payload.number, payload.category)?;
            Ok(Reply::success())
        }
        ("DELETE", ["parcels", id]) => {
            store.parcel_delete(parse_id(id)?)?;
            Ok(Reply::success())
        }

        ("GET", ["demography"]) => Ok(Reply::ok(to_json(&store.demography_list()?)?)),
        ("POST", ["demography"]) => {
            let input: DemographyInput = parse_body(body)?;
            Ok(Reply::created(store.demography_create(&input)?))
        }
        ("PUT", ["demography", id]) => {
            let id = parse_id(id)?;
            let input: DemographyInput = parse_body(body)?;
            store.demography_update(id, &input)?;
            Ok(Reply::success())
        }
        ("DELETE", ["demography", id]) => {
            store.demography_delete(parse_id(id)?)?;
            Ok(Reply::success())
        }

        ("GET", ["persons"]) => {
            let rows = store
                .persons_list()?
                .into_iter()
                .map(|row| {
                    let mut value = to_json(&row.person)?;
                    value["spouse_id"] = json!(row.spouse_id);
                    Ok(value)
                })
                .collect::<Result<Vec<Value>, ApiError>>()?;
            Ok(Reply::ok(Value::Array(rows)))
        }
        ("POST", ["persons"]) => {
            let input: PersonInput = parse_body(body)?;
            let id = store.person_create(&input)?;
            Ok(Reply::created(id.get()))
        }
        ("PUT", ["persons", id]) => {
            let id = parse_person_id(id)?;
            let input: PersonInput = parse_body(body)?;
            store.person_update(id, &input)?;
            Ok(Reply::success())
        }
        ("DELETE", ["persons", id]) => {
            store.person_delete(parse_person_id(id)?)?;
            Ok(Reply::success())
        }

        (
            _,
            ["dashboard-stats"]
            | ["protocols"]
            | ["protocols", _]
            | ["protocol-keys"]
            | ["parcels"]
            | ["parcels", _]
            | ["demography"]
            | ["demography", _]
            | ["persons"]
            | ["persons", _],
        ) => Err(ApiError::method_not_allowed()),
        _ => Err(ApiError::not_found()),
    }
}

/// Edited protocol fields; `plots`, when present, replaces every parcel link.
#[derive(Deserialize)]
struct ProtocolPayload {
    #[serde(flatten)]
    draft: ProtocolDraft,
    #[serde(default)]
    plots: Option<PlotsPayload>,
}

/// Parcel ids to link, split by ownership kind.
#[derive(Deserialize)]
struct PlotsPayload {
    #[serde(default)]
    actual: BTreeSet<i64>,
    #[serde(default)]
    protocol: BTreeSet<i64>,
}

impl PlotsPayload {
    fn into_selection(self) -> PlotSelection {
        PlotSelection {
            actual: self.actual,
            protocol: self.protocol,
        }
    }
}

#[derive(Deserialize)]
struct ParcelPayload {
    number: String,
    category: ParcelCategory,
}

fn parse_person_id(raw: &str) -> Result<PersonId, ApiError> {
    let id = parse_id(raw)?;
    PersonId::try_new(id).map_err(|err| ApiError::bad_request("INVALID_ID", err.message()))
}
