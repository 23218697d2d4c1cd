#![forbid(unsafe_code)]

//! JSON files produced by the desktop editors, as they are on disk.

use crate::dates::parse_protocol_date;
use crate::ids::{PersonId, ProtocolKey, ProtocolKeyError};
use crate::model::{DemographyInput, Gender, Ownership, ParcelCategory, ProtocolDraft, non_empty};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const OWNERS_FILE: &str = "owner_data_to_import.json";
pub const PARCELS_FILE: &str = "parcels_data.json";
pub const DEMOGRAPHY_FILE: &str = "demografia.json";
pub const GENEALOGY_FILE: &str = "genealogia.json";

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed {file}: {source}")]
    Json {
        file: &'static str,
        source: serde_json::Error,
    },
}

/// Plot number as written in the owner file: a plain string or number,
/// or a `{numerator, denominator}` fraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlotRef(Option<String>);

impl PlotRef {
    pub fn from_value(value: &Value) -> Self {
        Self(normalize_plot_number(value))
    }

    pub fn number(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<'de> Deserialize<'de> for PlotRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(PlotRef::from_value(&value))
    }
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// `"800/23"`, `{"numerator": 800, "denominator": 23}` and the misspelt
/// `numarator` all become `800/23`. A fraction without a denominator keeps
/// only the numerator.
pub fn normalize_plot_number(value: &Value) -> Option<String> {
    let text = match value {
        Value::Object(map) => {
            let mut numerator = scalar_text(map.get("numerator"));
            if numerator.is_empty() {
                numerator = scalar_text(map.get("numarator"));
            }
            let denominator = scalar_text(map.get("denominator"));
            if !numerator.is_empty() && !denominator.is_empty() {
                format!("{numerator}/{denominator}")
            } else {
                numerator
            }
        }
        other => scalar_text(Some(other)),
    };
    Some(text).filter(|t| !t.is_empty())
}

/// Kept only when the whole value is ASCII digits.
pub fn parse_order_number(value: &Value) -> Option<i64> {
    let text = scalar_text(Some(value));
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerFixture {
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub order_number: Value,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub genealogy: Option<String>,
    #[serde(default)]
    pub ownership_history: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default, rename = "wspolwlasnosc")]
    pub co_ownership: Option<String>,
    #[serde(default, rename = "powiazania_i_transakcje")]
    pub relations: Option<String>,
    #[serde(default, rename = "relacje_rodzinne")]
    pub legacy_relations: Option<String>,
    #[serde(default, rename = "interpretacja_i_wnioski")]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub protocol_date: Option<String>,
    #[serde(default)]
    pub protocol_location: Option<String>,
    #[serde(default, rename = "realbuildingPlots")]
    pub real_building_plots: Vec<PlotRef>,
    #[serde(default, rename = "realagriculturalPlots")]
    pub real_agricultural_plots: Vec<PlotRef>,
    #[serde(default)]
    pub building_plots: Vec<PlotRef>,
    #[serde(default)]
    pub agricultural_plots: Vec<PlotRef>,
}

/// One "owner holds plot N" line from an owner file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlotClaim {
    pub number: String,
    pub ownership: Ownership,
    /// Listed under building plots rather than agricultural ones.
    pub building: bool,
}

impl OwnerFixture {
    pub fn protocol_draft(&self, key: &str) -> Result<ProtocolDraft, ProtocolKeyError> {
        let relations = self
            .relations
            .as_deref()
            .or(self.legacy_relations.as_deref());
        Ok(ProtocolDraft {
            key: Some(ProtocolKey::try_new(key)?),
            owner_name: self.owner_name.as_deref().unwrap_or("").trim().to_string(),
            order_number: parse_order_number(&self.order_number),
            house_number: non_empty(self.house_number.as_deref()),
            genealogy: non_empty(self.genealogy.as_deref()),
            ownership_history: non_empty(self.ownership_history.as_deref()),
            remarks: non_empty(self.remarks.as_deref()),
            co_ownership: non_empty(self.co_ownership.as_deref()),
            relations: non_empty(relations),
            interpretation: non_empty(self.interpretation.as_deref()),
            protocol_date: self
                .protocol_date
                .as_deref()
                .and_then(parse_protocol_date),
            protocol_location: non_empty(self.protocol_location.as_deref()),
        })
    }

    /// Actual holdings first, then the ones declared in the protocol.
    pub fn plot_claims(&self) -> Vec<PlotClaim> {
        let groups = [
            (&self.real_building_plots, Ownership::Actual, true),
            (&self.real_agricultural_plots, Ownership::Actual, false),
            (&self.building_plots, Ownership::Protocol, true),
            (&self.agricultural_plots, Ownership::Protocol, false),
        ];
        let mut out = Vec::new();
        for (plots, ownership, building) in groups {
            for plot in plots {
                if let Some(number) = plot.number() {
                    out.push(PlotClaim {
                        number: number.to_string(),
                        ownership,
                        building,
                    });
                }
            }
        }
        out
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ParcelFixture {
    #[serde(default, rename = "geometria")]
    pub geometry: Value,
    #[serde(default, rename = "kategoria")]
    pub category: Option<String>,
}

impl ParcelFixture {
    /// Missing category means agricultural land; an unknown tag is `None`.
    pub fn category(&self) -> Option<ParcelCategory> {
        match self.category.as_deref().map(str::trim) {
            None | Some("") => Some(ParcelCategory::Agricultural),
            Some(tag) => ParcelCategory::parse(tag),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DemographyFixture {
    #[serde(default, rename = "rok")]
    pub year: Option<i32>,
    #[serde(default, rename = "populacja_ogolem")]
    pub population_total: Option<i64>,
    #[serde(default, rename = "katolicy")]
    pub catholics: Option<i64>,
    #[serde(default, rename = "zydzi")]
    pub jews: Option<i64>,
    #[serde(default, rename = "inni")]
    pub others: Option<i64>,
    #[serde(default, rename = "opis")]
    pub description: Option<String>,
}

impl DemographyFixture {
    pub fn to_input(&self) -> Option<DemographyInput> {
        Some(DemographyInput {
            year: self.year?,
            population_total: self.population_total,
            catholics: self.catholics,
            jews: self.jews,
            others: self.others,
            description: non_empty(self.description.as_deref()),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct YearFixture {
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonFixture {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub birth_date: Option<YearFixture>,
    #[serde(default)]
    pub death_date: Option<YearFixture>,
    #[serde(default)]
    pub protocol_key: Option<String>,
    #[serde(default)]
    pub father_id: Option<i64>,
    #[serde(default)]
    pub mother_id: Option<i64>,
    #[serde(default)]
    pub spouse_ids: Vec<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PersonFixture {
    pub fn person_id(&self) -> Option<PersonId> {
        PersonId::try_new(self.id).ok()
    }

    pub fn gender(&self) -> Option<Gender> {
        self.gender.as_deref().and_then(Gender::parse)
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.birth_date.and_then(|d| d.year)
    }

    pub fn death_year(&self) -> Option<i32> {
        self.death_date.and_then(|d| d.year)
    }

    pub fn protocol_key(&self) -> Option<ProtocolKey> {
        self.protocol_key
            .as_deref()
            .and_then(|k| ProtocolKey::try_new(k).ok())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct GenealogyFile {
    #[serde(default)]
    persons: Vec<PersonFixture>,
}

#[derive(Clone, Debug, Default)]
pub struct FixtureSet {
    pub owners: BTreeMap<String, OwnerFixture>,
    pub parcels: BTreeMap<String, ParcelFixture>,
    pub demography: Vec<DemographyFixture>,
    pub persons: Vec<PersonFixture>,
}

impl FixtureSet {
    pub fn from_json(
        owners: &str,
        parcels: &str,
        demography: Option<&str>,
        genealogy: Option<&str>,
    ) -> Result<Self, FixtureError> {
        let owners = serde_json::from_str(owners).map_err(|source| FixtureError::Json {
            file: OWNERS_FILE,
            source,
        })?;
        let parcels = serde_json::from_str(parcels).map_err(|source| FixtureError::Json {
            file: PARCELS_FILE,
            source,
        })?;
        let demography = match demography {
            Some(text) => serde_json::from_str(text).map_err(|source| FixtureError::Json {
                file: DEMOGRAPHY_FILE,
                source,
            })?,
            None => Vec::new(),
        };
        let persons = match genealogy {
            Some(text) => {
                serde_json::from_str::<GenealogyFile>(text)
                    .map_err(|source| FixtureError::Json {
                        file: GENEALOGY_FILE,
                        source,
                    })?
                    .persons
            }
            None => Vec::new(),
        };
        Ok(Self {
            owners,
            parcels,
            demography,
            persons,
        })
    }

    /// Owner and parcel files are required; the other two may be absent.
    pub fn load_dir(dir: &Path) -> Result<Self, FixtureError> {
        let owners = read_required(&dir.join(OWNERS_FILE))?;
        let parcels = read_required(&dir.join(PARCELS_FILE))?;
        let demography = read_optional(&dir.join(DEMOGRAPHY_FILE))?;
        let genealogy = read_optional(&dir.join(GENEALOGY_FILE))?;
        Self::from_json(
            &owners,
            &parcels,
            demography.as_deref(),
            genealogy.as_deref(),
        )
    }
}

fn read_required(path: &Path) -> Result<String, FixtureError> {
    std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional(path: &Path) -> Result<Option<String>, FixtureError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(FixtureError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plot_numbers_normalise() {
        assert_eq!(normalize_plot_number(&json!(" 12 ")), Some("12".to_string()));
        assert_eq!(normalize_plot_number(&json!(45)), Some("45".to_string()));
        assert_eq!(
            normalize_plot_number(&json!({"numerator": 800, "denominator": "23"})),
            Some("800/23".to_string())
        );
        assert_eq!(
            normalize_plot_number(&json!({"numarator": "800", "denominator": 2})),
            Some("800/2".to_string())
        );
        assert_eq!(
            normalize_plot_number(&json!({"numerator": "17"})),
            Some("17".to_string())
        );
        assert_eq!(normalize_plot_number(&json!("")), None);
        assert_eq!(normalize_plot_number(&json!(null)), None);
    }

    #[test]
    fn order_numbers_must_be_digits() {
        assert_eq!(parse_order_number(&json!("12")), Some(12));
        assert_eq!(parse_order_number(&json!(7)), Some(7));
        assert_eq!(parse_order_number(&json!("12a")), None);
        assert_eq!(parse_order_number(&json!(-3)), None);
        assert_eq!(parse_order_number(&json!(null)), None);
    }

    #[test]
    fn owner_fixture_becomes_a_draft() {
        let owner: OwnerFixture = serde_json::from_value(json!({
            "ownerName": " Jan Kowal ",
            "orderNumber": "3",
            "houseNumber": "",
            "protocolDate": "15 maja 1930 rok",
            "relacje_rodzinne": "[[Anna|W-2]]",
            "realbuildingPlots": ["5"],
            "agriculturalPlots": [{"numerator": 800, "denominator": 1}, ""]
        }))
        .unwrap();
        let draft = owner.protocol_draft("W-1").unwrap();
        assert_eq!(draft.owner_name, "Jan Kowal");
        assert_eq!(draft.order_number, Some(3));
        assert_eq!(draft.house_number, None);
        assert_eq!(draft.relations.as_deref(), Some("[[Anna|W-2]]"));
        assert!(draft.protocol_date.is_some());

        let claims = owner.plot_claims();
        assert_eq!(
            claims,
            vec![
                PlotClaim {
                    number: "5".to_string(),
                    ownership: Ownership::Actual,
                    building: true,
                },
                PlotClaim {
                    number: "800/1".to_string(),
                    ownership: Ownership::Protocol,
                    building: false,
                },
            ]
        );
    }

    #[test]
    fn fixture_set_parses_all_four_files() {
        let set = FixtureSet::from_json(
            r#"{"W-1": {"ownerName": "Jan"}}"#,
            r#"{"12": {"geometria": [[1,2],[3,4],[5,6]]}, "dom 1": {"kategoria": "dom", "geometria": [1,2]}}"#,
            Some(r#"[{"rok": 1921, "populacja_ogolem": 540}, {"opis": "no year"}]"#),
            Some(r#"{"persons": [{"id": 1, "name": "Jan", "gender": "M", "birthDate": {"year": 1890}, "spouseIds": [2]}]}"#),
        )
        .unwrap();
        assert_eq!(set.owners.len(), 1);
        assert_eq!(set.parcels["12"].category(), Some(ParcelCategory::Agricultural));
        assert_eq!(set.parcels["dom 1"].category(), Some(ParcelCategory::House));
        let inputs: Vec<_> = set.demography.iter().filter_map(|d| d.to_input()).collect();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].year, 1921);
        assert_eq!(set.persons[0].birth_year(), Some(1890));
        assert_eq!(set.persons[0].gender(), Some(Gender::Male));
    }

    #[test]
    fn malformed_file_names_the_culprit() {
        let err = FixtureSet::from_json("{}", "[1,", None, None).unwrap_err();
        assert!(matches!(err, FixtureError::Json { file: PARCELS_FILE, .. }));
    }
}
