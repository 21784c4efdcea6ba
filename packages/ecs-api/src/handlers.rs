//! Handlers for the inspection/control surface.

use std::collections::HashMap;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming as IncomingBody};
use hyper::{Request, Response};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use ecs_core::{BitMask256, SnapshotPolicy, StorageKind};
use ecs_recorder::RecordingReader;

use crate::dto::{QueryResultDto, SeekResultDto, StatsDto, TypeMetaDto};
use crate::error::ApiError;
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiErrorBody,
}

pub fn error_response(code: u16, message: String) -> ErrorResponse {
    ErrorResponse { success: false, error: ApiErrorBody { code, message } }
}

fn json_response<T: Serialize>(data: T) -> Result<Response<Full<Bytes>>, ApiError> {
    let body = serde_json::to_vec(&ApiResponse { success: true, data })
        .map_err(|e| ApiError::Internal(format!("failed to serialize response: {e}")))?;
    Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// `GET /stats` -- the facade's own [`ecs_runtime::Repository::stats`].
pub fn get_stats(state: AppState) -> Result<Response<Full<Bytes>>, ApiError> {
    let stats: StatsDto = state.live.load().stats().into();
    json_response(stats)
}

/// `GET /types` -- every registered component/event/singleton type, in
/// registration (ordinal) order.
pub fn get_types(state: AppState) -> Result<Response<Full<Bytes>>, ApiError> {
    let repo = state.live.load();
    let types: Vec<TypeMetaDto> = repo
        .type_registry()
        .iter()
        .map(|meta| TypeMetaDto {
            ordinal: meta.ordinal,
            name: meta.name.clone(),
            element_size: meta.element_size,
            storage_kind: match meta.storage_kind {
                StorageKind::Plain => "plain",
                StorageKind::Reference => "reference",
            },
            policy: match meta.policy {
                SnapshotPolicy::Persistent => "persistent",
                SnapshotPolicy::Transient => "transient",
                SnapshotPolicy::SnapshotViaClone => "snapshot_via_clone",
            },
        })
        .collect();
    json_response(types)
}

fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(query) = query else { return out };
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let Some(key) = parts.next() else { continue };
        let value = parts.next().unwrap_or("");
        out.insert(key.to_string(), percent_decode_str(value).decode_utf8_lossy().into_owned());
    }
    out
}

fn mask_from_names(names: &str, lookup: &ecs_core::TypeRegistry) -> Result<BitMask256, ApiError> {
    let mut mask = BitMask256::ZERO;
    for name in names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let meta = lookup
            .meta_by_name(name)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown component type '{name}'")))?;
        mask.set_bit(meta.ordinal);
    }
    Ok(mask)
}

/// `GET /query?include=A,B&exclude=C&since=123` -- runs a one-off query
/// against the live repository's current state. Never mutates it.
pub fn get_query(req: Request<IncomingBody>, state: AppState) -> Result<Response<Full<Bytes>>, ApiError> {
    let params = parse_query_string(req.uri().query());
    let repo = state.live.load();

    let mut builder = ecs_core::QueryDef::builder();
    if let Some(include) = params.get("include") {
        builder = builder.with_include(mask_from_names(include, repo.type_registry())?);
    }
    if let Some(exclude) = params.get("exclude") {
        builder = builder.with_exclude(mask_from_names(exclude, repo.type_registry())?);
    }
    let query = builder.build();

    let since_tick: Option<u32> = params
        .get("since")
        .map(|s| s.parse().map_err(|_| ApiError::BadRequest(format!("invalid since value '{s}'"))))
        .transpose()?;

    let matches: Vec<ecs_core::Entity> = match since_tick {
        Some(tick) => repo.enumerate_delta(&query, tick).collect(),
        None => repo.enumerate(&query).collect(),
    };

    let matched = matches.len();
    let limit = state.config.max_query_results;
    let truncated = matched > limit;
    let entities = matches.into_iter().take(limit).collect();

    json_response(QueryResultDto { matched, truncated, entities })
}

#[derive(Debug, Deserialize)]
struct RecorderSeekRequest {
    path: String,
    tick: u64,
}

/// `POST /recorder/seek` -- the one mutating endpoint, and it only ever
/// mutates the dedicated replica repository, never `state.live`.
pub async fn post_recorder_seek(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let body = req
        .collect()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?
        .to_bytes();
    let request: RecorderSeekRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;

    let path = std::path::PathBuf::from(&request.path);
    let mut readers = state.readers.lock();
    if !readers.contains_key(&path) {
        let reader = RecordingReader::open(&path)
            .map_err(|e| ApiError::NotFound(format!("failed to open recording '{}': {e}", request.path)))?;
        readers.insert(path.clone(), reader);
    }
    let reader = readers.get_mut(&path).expect("just inserted or already present");

    let mut replica = state.replica.lock();
    reader.seek_to(&mut replica, request.tick).map_err(ApiError::from)?;
    let stats: StatsDto = replica.stats().into();

    json_response(SeekResultDto { path: request.path, tick: request.tick, stats })
}
