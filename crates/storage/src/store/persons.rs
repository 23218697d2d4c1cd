#![forbid(unsafe_code)]

use super::protocols::protocol_id_by_key_tx;
use super::*;
use kataster_core::genealogy::spouse_index;
use kataster_core::ids::{Marriage, ProtocolKey};
use kataster_core::model::{Gender, Person, PersonInput, non_empty};
use rusqlite::{OptionalExtension, Transaction, params};

pub(super) const PERSON_COLUMNS: &str = "p.id, p.name, p.gender, p.house_number, p.birth_year, \
     p.death_year, p.father_id, p.mother_id, pr.key, p.notes";

pub(super) const PERSON_FROM: &str = "persons p LEFT JOIN protocols pr ON pr.id = p.protocol_id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonAdminRow {
    pub person: Person,
    /// First spouse by id, when the person has any.
    pub spouse_id: Option<PersonId>,
}

impl SqliteStore {
    /// Ordered by birth year (unknown last), then name.
    pub fn persons_list(&mut self) -> Result<Vec<PersonAdminRow>, StoreError> {
        let tx = self.conn.transaction()?;
        let persons = persons_all_tx(&tx)?;
        let marriages = marriages_all_tx(&tx)?;
        tx.commit()?;

        let spouses = spouse_index(marriages.iter());
        let mut rows: Vec<PersonAdminRow> = persons
            .into_iter()
            .map(|person| {
                let spouse_id = spouses
                    .get(&person.id)
                    .and_then(|list| list.first())
                    .copied();
                PersonAdminRow { person, spouse_id }
            })
            .collect();
        rows.sort_by(|a, b| {
            let year = |row: &PersonAdminRow| (row.person.birth_year.is_none(), row.person.birth_year);
            year(a)
                .cmp(&year(b))
                .then_with(|| a.person.name.cmp(&b.person.name))
                .then_with(|| a.person.id.cmp(&b.person.id))
        });
        Ok(rows)
    }

    pub fn person_create(&mut self, input: &PersonInput) -> Result<PersonId, StoreError> {
        let tx = self.conn.transaction()?;
        let fields = validate_person_tx(&tx, input, input.id)?;
        if let Some(id) = input.id {
            if person_exists_tx(&tx, id)? {
                return Err(StoreError::DuplicateKey(format!("person {id}")));
            }
        }

        tx.execute(
            "INSERT INTO persons(id, name, gender, house_number, birth_year, death_year, \
             father_id, mother_id, protocol_id, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                input.id.map(PersonId::get),
                fields.name,
                input.gender.map(Gender::as_str),
                fields.house_number,
                input.birth_year,
                input.death_year,
                input.father_id.map(PersonId::get),
                input.mother_id.map(PersonId::get),
                fields.protocol_id,
                fields.notes,
            ],
        )
        .map_err(|err| map_unique_conflict(err, || "person id".to_string()))?;
        let id = PersonId::try_new(tx.last_insert_rowid())
            .map_err(|_| StoreError::InvalidInput("person id must be positive"))?;

        if let Some(spouse) = input.spouse_id {
            insert_marriage_tx(&tx, id, spouse)?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Replaces every field and the person's marriages.
    pub fn person_update(&mut self, id: PersonId, input: &PersonInput) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        if !person_exists_tx(&tx, id)? {
            return Err(StoreError::UnknownPerson(id.get()));
        }
        let fields = validate_person_tx(&tx, input, Some(id))?;

        tx.execute(
            "UPDATE persons SET name = ?1, gender = ?2, house_number = ?3, birth_year = ?4, \
             death_year = ?5, father_id = ?6, mother_id = ?7, protocol_id = ?8, notes = ?9 \
             WHERE id = ?10",
            params![
                fields.name,
                input.gender.map(Gender::as_str),
                fields.house_number,
                input.birth_year,
                input.death_year,
                input.father_id.map(PersonId::get),
                input.mother_id.map(PersonId::get),
                fields.protocol_id,
                fields.notes,
                id.get(),
            ],
        )?;
        tx.execute(
            "DELETE FROM marriages WHERE person_a = ?1 OR person_b = ?1",
            params![id.get()],
        )?;
        if let Some(spouse) = input.spouse_id {
            insert_marriage_tx(&tx, id, spouse)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Removes the person, their marriages, and any parent references to them.
    pub fn person_delete(&mut self, id: PersonId) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        if !person_exists_tx(&tx, id)? {
            return Err(StoreError::UnknownPerson(id.get()));
        }
        tx.execute(
            "DELETE FROM marriages WHERE person_a = ?1 OR person_b = ?1",
            params![id.get()],
        )?;
        tx.execute(
            "UPDATE persons SET father_id = NULL WHERE father_id = ?1",
            params![id.get()],
        )?;
        tx.execute(
            "UPDATE persons SET mother_id = NULL WHERE mother_id = ?1",
            params![id.get()],
        )?;
        tx.execute("DELETE FROM persons WHERE id = ?1", params![id.get()])?;
        tx.commit()?;
        Ok(())
    }

    pub fn person_get(&mut self, id: PersonId) -> Result<Person, StoreError> {
        let tx = self.conn.transaction()?;
        let person = tx
            .query_row(
                &format!("SELECT {PERSON_COLUMNS} FROM {PERSON_FROM} WHERE p.id = ?1"),
                params![id.get()],
                person_from_row,
            )
            .optional()?;
        tx.commit()?;
        person.ok_or(StoreError::UnknownPerson(id.get()))
    }
}

struct PersonFields {
    name: String,
    house_number: Option<String>,
    notes: Option<String>,
    protocol_id: Option<i64>,
}

fn validate_person_tx(
    tx: &Transaction<'_>,
    input: &PersonInput,
    own_id: Option<PersonId>,
) -> Result<PersonFields, StoreError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(StoreError::InvalidInput("person name must not be empty"));
    }
    let refs = [
        (input.father_id, "unknown father id", "a person cannot be their own father"),
        (input.mother_id, "unknown mother id", "a person cannot be their own mother"),
        (input.spouse_id, "unknown spouse id", "a person cannot be married to themselves"),
    ];
    for (reference, unknown, own) in refs {
        let Some(reference) = reference else {
            continue;
        };
        if Some(reference) == own_id {
            return Err(StoreError::InvalidInput(own));
        }
        if !person_exists_tx(tx, reference)? {
            return Err(StoreError::InvalidInput(unknown));
        }
    }
    if input.father_id.is_some() && input.father_id == input.mother_id {
        return Err(StoreError::InvalidInput("father and mother must differ"));
    }
    let protocol_id = match input.protocol_key.as_ref() {
        Some(key) => Some(
            protocol_id_by_key_tx(tx, key.as_str())?
                .ok_or(StoreError::InvalidInput("unknown protocol key"))?,
        ),
        None => None,
    };
    Ok(PersonFields {
        name: name.to_string(),
        house_number: non_empty(input.house_number.as_deref()),
        notes: non_empty(input.notes.as_deref()),
        protocol_id,
    })
}

pub(super) fn person_exists_tx(tx: &Transaction<'_>, id: PersonId) -> Result<bool, StoreError> {
    Ok(tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM persons WHERE id = ?1)",
        params![id.get()],
        |row| row.get(0),
    )?)
}

/// Canonical pair; an existing marriage is left alone.
pub(super) fn insert_marriage_tx(
    tx: &Transaction<'_>,
    x: PersonId,
    y: PersonId,
) -> Result<bool, StoreError> {
    let marriage =
        Marriage::new(x, y).map_err(|err| StoreError::InvalidInput(err.message()))?;
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO marriages(person_a, person_b) VALUES (?1, ?2)",
        params![marriage.a().get(), marriage.b().get()],
    )?;
    Ok(inserted > 0)
}

pub(super) fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    let gender: Option<String> = row.get(2)?;
    let key: Option<String> = row.get(8)?;
    Ok(Person {
        id: person_id_col(row, 0)?,
        name: row.get(1)?,
        gender: gender.as_deref().and_then(Gender::parse),
        house_number: row.get(3)?,
        birth_year: row.get(4)?,
        death_year: row.get(5)?,
        father_id: opt_person_id_col(row, 6)?,
        mother_id: opt_person_id_col(row, 7)?,
        protocol_key: key.and_then(|k| ProtocolKey::try_new(k).ok()),
        notes: row.get(9)?,
    })
}

pub(super) fn persons_all_tx(tx: &Transaction<'_>) -> Result<Vec<Person>, StoreError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {PERSON_COLUMNS} FROM {PERSON_FROM} ORDER BY p.id"
    ))?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(person_from_row(row)?);
    }
    Ok(out)
}

pub(super) fn marriages_all_tx(tx: &Transaction<'_>) -> Result<Vec<Marriage>, StoreError> {
    let mut stmt = tx.prepare("SELECT person_a, person_b FROM marriages ORDER BY person_a, person_b")?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(marriage_from_row(row)?);
    }
    Ok(out)
}

pub(super) fn marriage_from_row(row: &Row<'_>) -> Result<Marriage, StoreError> {
    let a = person_id_col(row, 0)?;
    let b = person_id_col(row, 1)?;
    Marriage::new(a, b).map_err(|err| StoreError::InvalidInput(err.message()))
}
