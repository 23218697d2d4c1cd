#![forbid(unsafe_code)]

use crate::ids::{Marriage, PersonId};
use crate::model::Person;
use std::collections::{BTreeSet, VecDeque};

/// Read access the assembler needs from whatever holds the family records.
///
/// `neighbors` must return parents, children and spouses of `id` in one
/// call. Ids it returns do not have to resolve to a record.
pub trait FamilyStore {
    type Error;

    fn contains(&self, id: PersonId) -> Result<bool, Self::Error>;

    fn neighbors(&self, id: PersonId) -> Result<BTreeSet<PersonId>, Self::Error>;

    fn fetch_persons(&self, ids: &BTreeSet<PersonId>) -> Result<Vec<Person>, Self::Error>;

    /// Marriages with both endpoints in `ids`.
    fn fetch_marriages(&self, ids: &BTreeSet<PersonId>) -> Result<Vec<Marriage>, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError<E> {
    #[error("person {0} does not exist")]
    UnknownPerson(PersonId),
    #[error("family store failed: {0}")]
    Store(E),
}

/// Connected family of one person.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FamilyComponent {
    pub root: PersonId,
    /// Ascending by id, unique.
    pub persons: Vec<Person>,
    /// Ascending, both endpoints in `persons`.
    pub marriages: Vec<Marriage>,
    /// Ids reached through a link that have no record.
    pub unresolved: Vec<PersonId>,
}

impl FamilyComponent {
    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|idx| &self.persons[idx])
    }

    pub fn contains(&self, id: PersonId) -> bool {
        self.person(id).is_some()
    }

    pub fn ids(&self) -> BTreeSet<PersonId> {
        self.persons.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }
}

/// Breadth-first walk over parent, child and spouse links starting at `root`.
pub fn assemble_component<S>(
    store: &S,
    root: PersonId,
) -> Result<FamilyComponent, AssembleError<S::Error>>
where
    S: FamilyStore + ?Sized,
{
    if !store.contains(root).map_err(AssembleError::Store)? {
        return Err(AssembleError::UnknownPerson(root));
    }

    let mut visited = BTreeSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for neighbor in store.neighbors(current).map_err(AssembleError::Store)? {
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    let mut persons = store
        .fetch_persons(&visited)
        .map_err(AssembleError::Store)?;
    persons.retain(|p| visited.contains(&p.id));
    persons.sort_by_key(|p| p.id);
    persons.dedup_by_key(|p| p.id);

    let resolved: BTreeSet<PersonId> = persons.iter().map(|p| p.id).collect();
    let unresolved: Vec<PersonId> = visited.difference(&resolved).copied().collect();

    let mut marriages = store
        .fetch_marriages(&visited)
        .map_err(AssembleError::Store)?;
    marriages.retain(|m| resolved.contains(&m.a()) && resolved.contains(&m.b()));
    marriages.sort();
    marriages.dedup();

    Ok(FamilyComponent {
        root,
        persons,
        marriages,
        unresolved,
    })
}
