#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use sha2::Digest;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const DEFAULT_DB_PATH: &str = "kataster.db";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
pub(crate) const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ServerConfig {
    pub(crate) db_path: PathBuf,
    pub(crate) host: String,
    pub(crate) port: u16,
    /// Lowercase hex SHA-256 of the admin bearer token. `None` leaves admin routes open.
    pub(crate) admin_token_sha256: Option<String>,
    /// Explicit filter from the file or the command line; `RUST_LOG` applies otherwise.
    pub(crate) log_filter: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            admin_token_sha256: None,
            log_filter: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    db_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    admin_token_sha256: Option<String>,
    log_filter: Option<String>,
}

/// Values from the environment and the command line; clap merges the two.
#[derive(Clone, Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) db_path: Option<PathBuf>,
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) admin_token_sha256: Option<String>,
    pub(crate) log_filter: Option<String>,
}

impl ServerConfig {
    pub(crate) fn load(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file_config = match file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("read config {}", path.display()))?;
                parse_file_config(&raw).with_context(|| format!("parse config {}", path.display()))?
            }
            None => FileConfig::default(),
        };
        Self::from_layers(file_config, overrides)
    }

    fn from_layers(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let defaults = Self::default();
        let admin_token_sha256 = overrides
            .admin_token_sha256
            .or(file.admin_token_sha256)
            .map(|digest| normalize_digest(&digest))
            .transpose()?;
        let host = overrides.host.or(file.host).unwrap_or(defaults.host);
        if host.trim().is_empty() {
            return Err(anyhow!("host must not be empty"));
        }
        Ok(Self {
            db_path: overrides.db_path.or(file.db_path).unwrap_or(defaults.db_path),
            host: host.trim().to_string(),
            port: overrides.port.or(file.port).unwrap_or(defaults.port),
            admin_token_sha256,
            log_filter: overrides
                .log_filter
                .or(file.log_filter)
                .filter(|filter| !filter.trim().is_empty()),
        })
    }

    pub(crate) fn bind_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

fn parse_file_config(raw: &str) -> Result<FileConfig> {
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

fn normalize_digest(raw: &str) -> Result<String> {
    let digest = raw.trim().to_ascii_lowercase();
    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "admin_token_sha256 must be 64 hex characters (sha256 of the token)"
        ));
    }
    Ok(digest)
}

pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Checks an `Authorization` header value against the configured digest.
pub(crate) fn admin_token_matches(expected_sha256: &str, authorization: Option<&str>) -> bool {
    let Some(header) = authorization.map(str::trim) else {
        return false;
    };
    let Some((scheme, token)) = header.split_once(' ') else {
        return false;
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return false;
    }
    let token = token.trim();
    if token.is_empty() {
        return false;
    }
    let actual = hash_token(token);
    actual.len() == expected_sha256.len()
        && actual
            .bytes()
            .zip(expected_sha256.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
