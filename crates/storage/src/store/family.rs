#![forbid(unsafe_code)]

use super::persons::{
    PERSON_COLUMNS, PERSON_FROM, marriage_from_row, marriages_all_tx, person_from_row,
    persons_all_tx,
};
use super::protocols::protocol_id_by_key_tx;
use super::*;
use kataster_core::genealogy::{
    AssembleError, FamilyComponent, FamilyStore, FamilyTree, MemoryFamilyStore, PopulationGraph,
    assemble_component,
};
use kataster_core::ids::Marriage;
use kataster_core::model::Person;
use rusqlite::{Transaction, params, params_from_iter};
use std::collections::BTreeSet;

/// `FamilyStore` over an open connection or transaction.
pub struct SqlFamilyStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqlFamilyStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl FamilyStore for SqlFamilyStore<'_> {
    type Error = StoreError;

    fn contains(&self, id: PersonId) -> Result<bool, StoreError> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM persons WHERE id = ?1)",
            params![id.get()],
            |row| row.get(0),
        )?)
    }

    fn neighbors(&self, id: PersonId) -> Result<BTreeSet<PersonId>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT father_id FROM persons WHERE id = ?1 AND father_id IS NOT NULL \
             UNION SELECT mother_id FROM persons WHERE id = ?1 AND mother_id IS NOT NULL \
             UNION SELECT person_b FROM marriages WHERE person_a = ?1 \
             UNION SELECT person_a FROM marriages WHERE person_b = ?1 \
             UNION SELECT id FROM persons WHERE father_id = ?1 OR mother_id = ?1",
        )?;
        let mut rows = stmt.query(params![id.get()])?;
        let mut out = BTreeSet::new();
        while let Some(row) = rows.next()? {
            out.insert(person_id_col(row, 0)?);
        }
        out.remove(&id);
        Ok(out)
    }

    fn fetch_persons(&self, ids: &BTreeSet<PersonId>) -> Result<Vec<Person>, StoreError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT {PERSON_COLUMNS} FROM {PERSON_FROM} WHERE p.id IN ({}) ORDER BY p.id",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                out.push(person_from_row(row)?);
            }
        }
        Ok(out)
    }

    fn fetch_marriages(&self, ids: &BTreeSet<PersonId>) -> Result<Vec<Marriage>, StoreError> {
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let mut out = Vec::new();
        for chunk in raw.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT person_a, person_b FROM marriages WHERE person_a IN ({}) \
                 ORDER BY person_a, person_b",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                let marriage = marriage_from_row(row)?;
                if ids.contains(&marriage.b()) {
                    out.push(marriage);
                }
            }
        }
        Ok(out)
    }
}

impl SqliteStore {
    pub fn family_component(&mut self, root: PersonId) -> Result<FamilyComponent, StoreError> {
        let tx = self.conn.transaction()?;
        let component = component_tx(&tx, root)?;
        tx.commit()?;
        Ok(component)
    }

    /// Tree for the lowest-id person linked to the protocol `key`.
    pub fn family_tree(&mut self, key: &str) -> Result<FamilyTree, StoreError> {
        let tx = self.conn.transaction()?;
        let Some(protocol_id) = protocol_id_by_key_tx(&tx, key)? else {
            return Err(StoreError::UnknownProtocol(key.to_string()));
        };
        let root: Option<i64> = tx.query_row(
            "SELECT MIN(id) FROM persons WHERE protocol_id = ?1",
            params![protocol_id],
            |row| row.get(0),
        )?;
        let Some(root) = root.and_then(|id| PersonId::try_new(id).ok()) else {
            return Err(StoreError::NoPersonForProtocol(key.to_string()));
        };
        let component = component_tx(&tx, root)?;
        tx.commit()?;
        Ok(FamilyTree::from_component(&component))
    }

    pub fn population_graph(&mut self) -> Result<PopulationGraph, StoreError> {
        let tx = self.conn.transaction()?;
        let persons = persons_all_tx(&tx)?;
        let marriages = marriages_all_tx(&tx)?;
        tx.commit()?;
        let store = MemoryFamilyStore::from_parts(persons, marriages);
        Ok(PopulationGraph::from_store(&store))
    }
}

fn component_tx(tx: &Transaction<'_>, root: PersonId) -> Result<FamilyComponent, StoreError> {
    match assemble_component(&SqlFamilyStore::new(tx), root) {
        Ok(component) => {
            if !component.unresolved.is_empty() {
                tracing::debug!(
                    root = root.get(),
                    unresolved = ?component.unresolved,
                    "family links point at missing persons"
                );
            }
            Ok(component)
        }
        Err(AssembleError::UnknownPerson(id)) => Err(StoreError::UnknownPerson(id.get())),
        Err(AssembleError::Store(err)) => Err(err),
    }
}
