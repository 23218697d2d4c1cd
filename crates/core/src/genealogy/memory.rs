#![forbid(unsafe_code)]

use super::FamilyStore;
use crate::ids::{Marriage, PersonId};
use crate::model::Person;
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;

/// In-memory family records. Marriages and parent links may point at ids
/// that have no record.
#[derive(Clone, Debug, Default)]
pub struct MemoryFamilyStore {
    persons: BTreeMap<PersonId, Person>,
    marriages: BTreeSet<Marriage>,
}

impl MemoryFamilyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        persons: impl IntoIterator<Item = Person>,
        marriages: impl IntoIterator<Item = Marriage>,
    ) -> Self {
        let mut store = Self::new();
        for person in persons {
            store.insert_person(person);
        }
        store.marriages.extend(marriages);
        store
    }

    /// Replaces any record with the same id.
    pub fn insert_person(&mut self, person: Person) {
        self.persons.insert(person.id, person);
    }

    pub fn insert_marriage(&mut self, marriage: Marriage) -> bool {
        self.marriages.insert(marriage)
    }

    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    pub fn marriages(&self) -> impl Iterator<Item = &Marriage> {
        self.marriages.iter()
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }
}

impl FamilyStore for MemoryFamilyStore {
    type Error = Infallible;

    fn contains(&self, id: PersonId) -> Result<bool, Self::Error> {
        Ok(self.persons.contains_key(&id))
    }

    fn neighbors(&self, id: PersonId) -> Result<BTreeSet<PersonId>, Self::Error> {
        let mut out = BTreeSet::new();
        if let Some(person) = self.persons.get(&id) {
            out.extend(person.father_id);
            out.extend(person.mother_id);
        }
        for child in self.persons.values() {
            if child.father_id == Some(id) || child.mother_id == Some(id) {
                out.insert(child.id);
            }
        }
        out.extend(self.marriages.iter().filter_map(|m| m.other(id)));
        out.remove(&id);
        Ok(out)
    }

    fn fetch_persons(&self, ids: &BTreeSet<PersonId>) -> Result<Vec<Person>, Self::Error> {
        Ok(ids
            .iter()
            .filter_map(|id| self.persons.get(id))
            .cloned()
            .collect())
    }

    fn fetch_marriages(&self, ids: &BTreeSet<PersonId>) -> Result<Vec<Marriage>, Self::Error> {
        Ok(self
            .marriages
            .iter()
            .filter(|m| ids.contains(&m.a()) && ids.contains(&m.b()))
            .copied()
            .collect())
    }
}
