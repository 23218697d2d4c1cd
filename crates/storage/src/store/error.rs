#![forbid(unsafe_code)]

use kataster_core::fixtures::FixtureError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid fixture: {0}")]
    InvalidFixture(String),
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),
    #[error("no person linked to protocol {0}")]
    NoPersonForProtocol(String),
    #[error("unknown person: {0}")]
    UnknownPerson(i64),
    #[error("unknown parcel: {0}")]
    UnknownParcel(i64),
    #[error("unknown demography entry: {0}")]
    UnknownDemography(i64),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
}

impl From<FixtureError> for StoreError {
    fn from(value: FixtureError) -> Self {
        match value {
            FixtureError::Io { path, source } => Self::Io(std::io::Error::new(
                source.kind(),
                format!("{}: {source}", path.display()),
            )),
            other => Self::InvalidFixture(other.to_string()),
        }
    }
}
