#![forbid(unsafe_code)]

use super::{FamilyComponent, spouse_index};
use crate::ids::{PersonId, ProtocolKey};
use crate::model::Gender;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct YearOnly {
    pub year: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePerson {
    pub id: PersonId,
    pub name: String,
    pub gender: Option<Gender>,
    pub house_number: Option<String>,
    pub birth_date: Option<YearOnly>,
    pub death_date: Option<YearOnly>,
    pub protocol_key: Option<ProtocolKey>,
    pub father_id: Option<PersonId>,
    pub mother_id: Option<PersonId>,
    pub spouse_ids: Vec<PersonId>,
    pub notes: Option<String>,
}

/// Payload for the family-tree renderer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyTree {
    pub root_id: PersonId,
    pub persons: Vec<TreePerson>,
}

impl FamilyTree {
    /// Parent ids outside the component come out as `null`. Only the root
    /// carries its protocol key.
    pub fn from_component(component: &FamilyComponent) -> Self {
        let spouses = spouse_index(component.marriages.iter());
        let resolve = |id: Option<PersonId>| id.filter(|id| component.contains(*id));

        let persons = component
            .persons
            .iter()
            .map(|p| TreePerson {
                id: p.id,
                name: p.name.clone(),
                gender: p.gender,
                house_number: p.house_number.clone(),
                birth_date: p.birth_year.map(|year| YearOnly { year }),
                death_date: p.death_year.map(|year| YearOnly { year }),
                protocol_key: if p.id == component.root {
                    p.protocol_key.clone()
                } else {
                    None
                },
                father_id: resolve(p.father_id),
                mother_id: resolve(p.mother_id),
                spouse_ids: spouses.get(&p.id).cloned().unwrap_or_default(),
                notes: p.notes.clone(),
            })
            .collect();

        Self {
            root_id: component.root,
            persons,
        }
    }

    pub fn person(&self, id: PersonId) -> Option<&TreePerson> {
        self.persons.iter().find(|p| p.id == id)
    }
}
