#![forbid(unsafe_code)]

use super::MemoryFamilyStore;
use crate::ids::{Marriage, PersonId, ProtocolKey};
use crate::model::{Gender, Person};
use serde::Serialize;
use std::collections::BTreeSet;

const MALE_SHAPE: &str = "box";
const OTHER_SHAPE: &str = "ellipse";
const MALE_COLOR: &str = "#3498db";
const OTHER_COLOR: &str = "#e91e63";
const MARRIAGE_COLOR: &str = "#9b59b6";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationNode {
    pub id: PersonId,
    pub label: String,
    pub shape: &'static str,
    pub color: &'static str,
    pub title: String,
    pub protocol_key: Option<ProtocolKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PopulationEdge {
    pub from: PersonId,
    pub to: PersonId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrows: Option<&'static str>,
}

impl PopulationEdge {
    fn parent(parent: PersonId, child: PersonId) -> Self {
        Self {
            from: parent,
            to: child,
            dashes: None,
            color: None,
            arrows: None,
        }
    }

    fn marriage(marriage: &Marriage) -> Self {
        Self {
            from: marriage.a(),
            to: marriage.b(),
            dashes: Some(true),
            color: Some(MARRIAGE_COLOR),
            arrows: Some(""),
        }
    }

    pub fn is_marriage(&self) -> bool {
        self.dashes == Some(true)
    }
}

/// Every person and every link, shaped for a network renderer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PopulationGraph {
    pub nodes: Vec<PopulationNode>,
    pub edges: Vec<PopulationEdge>,
}

impl PopulationGraph {
    pub fn build<'a>(
        persons: impl IntoIterator<Item = &'a Person>,
        marriages: impl IntoIterator<Item = &'a Marriage>,
    ) -> Self {
        let mut graph = Self::default();
        let mut ids = BTreeSet::new();
        let mut parent_links = Vec::new();

        for person in persons {
            if !ids.insert(person.id) {
                continue;
            }
            graph.nodes.push(node(person));
            parent_links.extend(person.father_id.map(|f| (f, person.id)));
            parent_links.extend(person.mother_id.map(|m| (m, person.id)));
        }

        for (parent, child) in parent_links {
            if ids.contains(&parent) {
                graph.edges.push(PopulationEdge::parent(parent, child));
            }
        }
        for marriage in marriages {
            if ids.contains(&marriage.a()) && ids.contains(&marriage.b()) {
                graph.edges.push(PopulationEdge::marriage(marriage));
            }
        }
        graph
    }

    pub fn from_store(store: &MemoryFamilyStore) -> Self {
        Self::build(store.persons(), store.marriages())
    }
}

fn node(person: &Person) -> PopulationNode {
    let male = person.gender == Some(Gender::Male);
    let mut title = format!("ID: {}", person.id);
    if let Some(key) = &person.protocol_key {
        title.push_str(&format!("\nProtokół: {key}"));
    }
    PopulationNode {
        id: person.id,
        label: person.name.clone(),
        shape: if male { MALE_SHAPE } else { OTHER_SHAPE },
        color: if male { MALE_COLOR } else { OTHER_COLOR },
        title,
        protocol_key: person.protocol_key.clone(),
    }
}
