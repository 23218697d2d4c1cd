#![forbid(unsafe_code)]

mod admin;
mod public;

use crate::config::admin_token_matches;
use crate::http::{
    ApiError, HttpRequest, normalize_path, path_segments, read_request, write_api_error,
    write_json,
};
use kataster_storage::{SqliteStore, StoreError};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

pub(crate) struct AppState {
    pub(crate) store: SqliteStore,
    pub(crate) admin_token_sha256: Option<String>,
}

/// Successful handler result.
pub(crate) struct Reply {
    status: &'static str,
    body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self {
            status: "200 OK",
            body,
        }
    }

    fn success() -> Self {
        Self::ok(json!({ "status": "success" }))
    }

    fn created(id: i64) -> Self {
        Self {
            status: "201 Created",
            body: json!({ "status": "success", "id": id }),
        }
    }
}

type ApiResult = Result<Reply, ApiError>;

/// Serves one request per connection until the listener fails.
pub(crate) fn run(listener: TcpListener, state: &mut AppState) -> std::io::Result<()> {
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, state) {
                    tracing::debug!(error = %err, "connection dropped");
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                std::thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, state: &mut AppState) -> std::io::Result<()> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_request(&mut stream)? else {
        return Ok(());
    };

    let started = Instant::now();
    let head_only = request.method == "HEAD";
    let path = normalize_path(&request.path);
    let (status, written) = match dispatch(state, &request, &path) {
        Ok(reply) => (
            reply.status,
            write_json(&mut stream, reply.status, &reply.body, head_only),
        ),
        Err(error) => (error.status, write_api_error(&mut stream, &error, head_only)),
    };
    tracing::info!(
        method = %request.method,
        path = %path,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    written
}

fn dispatch(state: &mut AppState, request: &HttpRequest, path: &str) -> ApiResult {
    if request.body_too_large {
        return Err(ApiError::payload_too_large());
    }
    let Some(segments) = path_segments(path) else {
        return Err(ApiError::bad_request(
            "INVALID_PATH",
            "Path segments must be valid UTF-8.",
        ));
    };
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let method = match request.method.as_str() {
        "HEAD" => "GET",
        other => other,
    };

    match segments.as_slice() {
        ["api", "admin", rest @ ..] => {
            authorize(state, request)?;
            admin::route(&mut state.store, method, rest, &request.body)
        }
        ["api", rest @ ..] => public::route(&mut state.store, method, rest, &request.body),
        _ => Err(ApiError::not_found()),
    }
}

fn authorize(state: &AppState, request: &HttpRequest) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token_sha256.as_deref() else {
        return Ok(());
    };
    if admin_token_matches(expected, request.authorization.as_deref()) {
        return Ok(());
    }
    Err(ApiError::new(
        "401 Unauthorized",
        "UNAUTHORIZED",
        "Admin token missing or invalid.",
    )
    .with_recovery("Send Authorization: Bearer <token>."))
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownProtocol(key) => ApiError::new(
                "404 Not Found",
                "PROTOCOL_NOT_FOUND",
                format!("Unknown protocol: {key}."),
            ),
            StoreError::NoPersonForProtocol(key) => ApiError::new(
                "404 Not Found",
                "NO_PERSON_FOR_PROTOCOL",
                format!("No person found for protocol key {key}."),
            ),
            StoreError::UnknownPerson(id) => ApiError::new(
                "404 Not Found",
                "PERSON_NOT_FOUND",
                format!("No graph member found for person {id}."),
            ),
            StoreError::UnknownParcel(id) => ApiError::new(
                "404 Not Found",
                "PARCEL_NOT_FOUND",
                format!("Unknown parcel: {id}."),
            ),
            StoreError::UnknownDemography(id) => ApiError::new(
                "404 Not Found",
                "DEMOGRAPHY_NOT_FOUND",
                format!("Unknown demography entry: {id}."),
            ),
            StoreError::InvalidInput(message) => ApiError::bad_request("INVALID_INPUT", message),
            StoreError::DuplicateKey(what) => ApiError::new(
                "409 Conflict",
                "DUPLICATE_KEY",
                format!("Already exists: {what}."),
            ),
            other => {
                tracing::error!(error = %other, "store failure");
                ApiError::new("500 Internal Server Error", "STORE_ERROR", "Storage failure.")
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| {
        ApiError::bad_request("INVALID_JSON", format!("Request body is not valid: {err}."))
    })
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request("INVALID_ID", format!("Invalid id: {raw}.")))
}
