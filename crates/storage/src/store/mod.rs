#![forbid(unsafe_code)]

mod demography;
mod error;
mod family;
mod import;
mod parcels;
mod persons;
mod protocols;
mod schema;
mod stats;

pub use error::StoreError;
pub use family::SqlFamilyStore;
pub use import::ImportReport;
pub use parcels::{OwnerFeatures, ParcelAdminRow};
pub use persons::PersonAdminRow;
pub use protocols::{
    OwnedPlot, PlotLink, PlotSelection, ProtocolDetail, ProtocolKeyRow, ProtocolSummary,
    ProtocolsOverview,
};
pub use stats::{DashboardCounts, ProtocolDay, RankingRow, Rankings, Stats};

use kataster_core::ids::PersonId;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        let store = Self::init(conn, Some(db_path))?;
        tracing::info!(path = ?store.db_path, "store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::install_schema(&conn)?;
        Ok(Self { conn, db_path })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn map_unique_conflict(err: rusqlite::Error, what: impl FnOnce() -> String) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::DuplicateKey(what());
    }
    StoreError::Sql(err)
}

fn person_id_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<PersonId> {
    let raw: i64 = row.get(idx)?;
    PersonId::try_new(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}

fn opt_person_id_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<PersonId>> {
    let raw: Option<i64> = row.get(idx)?;
    raw.map(|value| {
        PersonId::try_new(value).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err))
        })
    })
    .transpose()
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// SQLite caps bound parameters per statement; batch lookups stay well below it.
const ID_CHUNK: usize = 500;
