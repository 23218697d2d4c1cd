#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64")]
pub struct PersonId(i64);

impl PersonId {
    pub fn get(self) -> i64 {
        self.0
    }

    pub fn try_new(value: i64) -> Result<Self, PersonIdError> {
        if value <= 0 {
            return Err(PersonIdError::NotPositive);
        }
        Ok(Self(value))
    }
}

impl TryFrom<i64> for PersonId {
    type Error = PersonIdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersonIdError {
    NotPositive,
}

impl PersonIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotPositive => "person id must be a positive integer",
        }
    }
}

impl fmt::Display for PersonIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for PersonIdError {}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProtocolKey(String);

impl ProtocolKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, ProtocolKeyError> {
        let value = value.into();
        let trimmed = value.trim();
        validate_protocol_key(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for ProtocolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProtocolKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ProtocolKey::try_new(raw).map_err(|err| serde::de::Error::custom(err.message()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolKeyError {
    Empty,
    TooLong,
    ContainsMarkup,
    ContainsControl,
}

impl ProtocolKeyError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "protocol key must not be empty",
            Self::TooLong => "protocol key is too long",
            Self::ContainsMarkup => "protocol key must not contain link markup characters",
            Self::ContainsControl => "protocol key contains control characters",
        }
    }
}

impl fmt::Display for ProtocolKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ProtocolKeyError {}

fn validate_protocol_key(value: &str) -> Result<(), ProtocolKeyError> {
    if value.is_empty() {
        return Err(ProtocolKeyError::Empty);
    }
    if value.chars().count() > 64 {
        return Err(ProtocolKeyError::TooLong);
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(ProtocolKeyError::ContainsControl);
    }
    if value.chars().any(|c| matches!(c, '|' | '[' | ']')) {
        return Err(ProtocolKeyError::ContainsMarkup);
    }
    Ok(())
}

/// Unordered pair of spouses, stored with the smaller id first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Marriage {
    a: PersonId,
    b: PersonId,
}

impl Marriage {
    pub fn new(x: PersonId, y: PersonId) -> Result<Self, MarriageError> {
        if x == y {
            return Err(MarriageError::SelfMarriage);
        }
        let (a, b) = if x < y { (x, y) } else { (y, x) };
        Ok(Self { a, b })
    }

    pub fn a(&self) -> PersonId {
        self.a
    }

    pub fn b(&self) -> PersonId {
        self.b
    }

    pub fn contains(&self, id: PersonId) -> bool {
        self.a == id || self.b == id
    }

    pub fn other(&self, id: PersonId) -> Option<PersonId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarriageError {
    SelfMarriage,
}

impl MarriageError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::SelfMarriage => "a person cannot be married to themselves",
        }
    }
}

impl fmt::Display for MarriageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for MarriageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_matches_message() {
        assert_eq!(
            PersonId::try_new(0).unwrap_err().to_string(),
            PersonIdError::NotPositive.message()
        );
        for (raw, expected) in [
            ("  ", ProtocolKeyError::Empty),
            ("A|B", ProtocolKeyError::ContainsMarkup),
            ("A\tB", ProtocolKeyError::ContainsControl),
        ] {
            let err = ProtocolKey::try_new(raw).unwrap_err();
            assert_eq!(err, expected);
            assert_eq!(err.to_string(), expected.message());
        }
        let id = PersonId::try_new(7).unwrap();
        let err = Marriage::new(id, id).unwrap_err();
        assert_eq!(err.to_string(), "a person cannot be married to themselves");
    }
}
