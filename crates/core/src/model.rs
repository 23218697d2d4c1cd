#![forbid(unsafe_code)]

use crate::dates::iso_date_opt;
use crate::geometry::Geometry;
use crate::ids::{PersonId, ProtocolKey};
use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    /// Unknown tags are treated as "not recorded".
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "M" | "m" => Some(Gender::Male),
            "F" | "f" | "K" | "k" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub gender: Option<Gender>,
    pub house_number: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub father_id: Option<PersonId>,
    pub mother_id: Option<PersonId>,
    pub protocol_key: Option<ProtocolKey>,
    pub notes: Option<String>,
}

impl Person {
    pub fn new(id: PersonId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            gender: None,
            house_number: None,
            birth_year: None,
            death_year: None,
            father_id: None,
            mother_id: None,
            protocol_key: None,
            notes: None,
        }
    }

    /// Last word of a multi-word name.
    pub fn surname(&self) -> Option<&str> {
        let name = self.name.trim();
        if !name.contains(char::is_whitespace) {
            return None;
        }
        name.split_whitespace().last()
    }
}

/// Admin payload for creating or editing a person. On update the path id wins.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PersonInput {
    pub id: Option<PersonId>,
    pub name: String,
    #[serde(default, deserialize_with = "gender_lenient")]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub death_year: Option<i32>,
    #[serde(default)]
    pub father_id: Option<PersonId>,
    #[serde(default)]
    pub mother_id: Option<PersonId>,
    #[serde(default)]
    pub spouse_id: Option<PersonId>,
    #[serde(default)]
    pub protocol_key: Option<ProtocolKey>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn gender_lenient<'de, D>(deserializer: D) -> Result<Option<Gender>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Gender::parse))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDraft {
    pub key: Option<ProtocolKey>,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub order_number: Option<i64>,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub genealogy: Option<String>,
    #[serde(default)]
    pub ownership_history: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub co_ownership: Option<String>,
    #[serde(default)]
    pub relations: Option<String>,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default, with = "iso_date_opt")]
    pub protocol_date: Option<Date>,
    #[serde(default)]
    pub protocol_location: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Protocol {
    pub id: i64,
    pub key: ProtocolKey,
    pub owner_name: String,
    pub order_number: Option<i64>,
    pub house_number: Option<String>,
    pub genealogy: Option<String>,
    pub ownership_history: Option<String>,
    pub remarks: Option<String>,
    pub co_ownership: Option<String>,
    pub relations: Option<String>,
    pub interpretation: Option<String>,
    #[serde(with = "iso_date_opt")]
    pub protocol_date: Option<Date>,
    pub protocol_location: Option<String>,
}

impl Protocol {
    pub fn order_label(&self) -> String {
        self.order_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParcelCategory {
    #[serde(rename = "rolna")]
    Agricultural,
    #[serde(rename = "budowlana")]
    Building,
    #[serde(rename = "las")]
    Forest,
    #[serde(rename = "pastwisko")]
    Pasture,
    #[serde(rename = "droga")]
    Road,
    #[serde(rename = "rzeka")]
    River,
    #[serde(rename = "dom")]
    House,
    #[serde(rename = "budynek")]
    Structure,
    #[serde(rename = "kapliczka")]
    Shrine,
    #[serde(rename = "dworzec")]
    Station,
    #[serde(rename = "obiekt_specjalny")]
    Special,
}

impl ParcelCategory {
    pub const ALL: [ParcelCategory; 11] = [
        ParcelCategory::Agricultural,
        ParcelCategory::Building,
        ParcelCategory::Forest,
        ParcelCategory::Pasture,
        ParcelCategory::Road,
        ParcelCategory::River,
        ParcelCategory::House,
        ParcelCategory::Structure,
        ParcelCategory::Shrine,
        ParcelCategory::Station,
        ParcelCategory::Special,
    ];

    /// Categories that get their own ownership ranking.
    pub const RANKED: [ParcelCategory; 9] = [
        ParcelCategory::Agricultural,
        ParcelCategory::Building,
        ParcelCategory::Forest,
        ParcelCategory::Pasture,
        ParcelCategory::Road,
        ParcelCategory::River,
        ParcelCategory::Structure,
        ParcelCategory::Shrine,
        ParcelCategory::Special,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParcelCategory::Agricultural => "rolna",
            ParcelCategory::Building => "budowlana",
            ParcelCategory::Forest => "las",
            ParcelCategory::Pasture => "pastwisko",
            ParcelCategory::Road => "droga",
            ParcelCategory::River => "rzeka",
            ParcelCategory::House => "dom",
            ParcelCategory::Structure => "budynek",
            ParcelCategory::Shrine => "kapliczka",
            ParcelCategory::Station => "dworzec",
            ParcelCategory::Special => "obiekt_specjalny",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    pub fn geometry_kind(self) -> GeometryKind {
        match self {
            ParcelCategory::House
            | ParcelCategory::Structure
            | ParcelCategory::Shrine
            | ParcelCategory::Station
            | ParcelCategory::Special => GeometryKind::Point,
            ParcelCategory::Road | ParcelCategory::River => GeometryKind::Line,
            _ => GeometryKind::Polygon,
        }
    }

    /// Houses and standalone buildings a house number can point at.
    pub fn is_dwelling(self) -> bool {
        matches!(self, ParcelCategory::House | ParcelCategory::Structure)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// Holding confirmed on the ground.
    Actual,
    /// Holding as declared in the protocol.
    Protocol,
}

impl Ownership {
    pub fn as_str(self) -> &'static str {
        match self {
            Ownership::Actual => "actual",
            Ownership::Protocol => "protocol",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "actual" => Some(Ownership::Actual),
            "protocol" => Some(Ownership::Protocol),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parcel {
    pub id: i64,
    pub number: String,
    pub category: ParcelCategory,
    pub geometry: Option<Geometry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographyInput {
    pub year: i32,
    #[serde(default)]
    pub population_total: Option<i64>,
    #[serde(default)]
    pub catholics: Option<i64>,
    #[serde(default)]
    pub jews: Option<i64>,
    #[serde(default)]
    pub others: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DemographyEntry {
    pub id: i64,
    #[serde(flatten)]
    pub values: DemographyInput,
}

/// Trims and turns empty strings into `None`.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_tags_round_trip() {
        for category in ParcelCategory::ALL {
            assert_eq!(ParcelCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(ParcelCategory::parse("meadow"), None);
        assert_eq!(ParcelCategory::Road.geometry_kind(), GeometryKind::Line);
        assert_eq!(ParcelCategory::Shrine.geometry_kind(), GeometryKind::Point);
        assert_eq!(ParcelCategory::Forest.geometry_kind(), GeometryKind::Polygon);
    }

    #[test]
    fn surname_needs_two_words() {
        let id = PersonId::try_new(1).expect("id");
        assert_eq!(Person::new(id, "Jan Kowalski").surname(), Some("Kowalski"));
        assert_eq!(Person::new(id, "Jan").surname(), None);
        assert_eq!(Person::new(id, "  ").surname(), None);
    }

    #[test]
    fn gender_tags_are_lenient() {
        assert_eq!(Gender::parse("M"), Some(Gender::Male));
        assert_eq!(Gender::parse(" f "), Some(Gender::Female));
        assert_eq!(Gender::parse("?"), None);
    }

    #[test]
    fn person_input_ignores_unknown_gender() {
        let input: PersonInput = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Anna Nowak",
            "gender": "X",
            "protocol_key": " W-1 "
        }))
        .expect("person input");
        assert_eq!(input.gender, None);
        assert_eq!(input.protocol_key.as_ref().map(|k| k.as_str()), Some("W-1"));
        assert_eq!(input.father_id, None);
    }
}
