//! JSON control API consumed by the player UI.
//!
//! Thin bridge over the core: coarse status polling, playback pulses, file
//! listings, magnet registration, and ready-to-use stream URL generation.
//! All endpoints honor the same stream token as the streaming path.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use undertow_core::pulse::handle_pulse;
use undertow_core::status::{TorrentStatus, aggregate_status};
use undertow_core::{InfoHash, StreamError};

use crate::server::{AppState, TokenQuery, authorize};

/// One file of a torrent as reported to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntryResponse {
    pub index: u32,
    pub path: String,
    pub size: u64,
}

/// Request body for magnet registration.
#[derive(Debug, Deserialize)]
pub struct AddTorrentRequest {
    pub magnet: String,
}

/// Response for magnet registration.
#[derive(Debug, Serialize)]
pub struct AddTorrentResponse {
    pub info_hash: String,
}

/// Request body for playback-position pulses.
#[derive(Debug, Deserialize)]
pub struct PulseRequest {
    pub file_index: u32,
    pub byte_position: u64,
}

/// Response for playback-position pulses.
#[derive(Debug, Serialize)]
pub struct PulseResponse {
    pub accepted: bool,
}

/// Query parameters for stream URL generation.
#[derive(Debug, Deserialize)]
pub struct StreamUrlQuery {
    pub file_index: u32,
    pub t: Option<String>,
}

/// Response carrying a ready-to-use stream URL.
#[derive(Debug, Serialize)]
pub struct StreamUrlResponse {
    pub url: String,
}

/// `GET /api/torrents/{info_hash}/status` -- coarse status for UI polling.
///
/// Unknown torrents report the idle state rather than 404; the UI polls
/// this endpoint across the whole torrent lifecycle.
pub async fn api_status(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TorrentStatus>, StatusCode> {
    authorize(&state, query.t.as_deref()).map_err(reject)?;
    let info_hash = parse_info_hash(&info_hash)?;

    let status =
        aggregate_status(state.engine.as_ref(), &state.config.scheduler, info_hash).await;
    Ok(Json(status))
}

/// `GET /api/torrents/{info_hash}/files` -- torrent file table.
///
/// Empty list while metadata has not arrived, matching the historic
/// bridge behavior the UI was written against.
pub async fn api_files(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<FileEntryResponse>>, StatusCode> {
    authorize(&state, query.t.as_deref()).map_err(reject)?;
    let info_hash = parse_info_hash(&info_hash)?;

    let files = match state.engine.layout(info_hash).await {
        Ok(layout) => layout
            .files
            .iter()
            .map(|file| FileEntryResponse {
                index: file.index,
                path: file.relative_path.clone(),
                size: file.size,
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    Ok(Json(files))
}

/// `POST /api/torrents/{info_hash}/pulse` -- playback-position pulse.
pub async fn api_pulse(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    Query(query): Query<TokenQuery>,
    Json(request): Json<PulseRequest>,
) -> Result<Json<PulseResponse>, StatusCode> {
    authorize(&state, query.t.as_deref()).map_err(reject)?;
    let info_hash = parse_info_hash(&info_hash)?;

    let accepted = handle_pulse(
        state.engine.as_ref(),
        &state.scheduler,
        info_hash,
        request.file_index,
        request.byte_position,
    )
    .await;
    Ok(Json(PulseResponse { accepted }))
}

/// `POST /api/torrents/add` -- register a torrent from a magnet link.
pub async fn api_add_torrent(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(request): Json<AddTorrentRequest>,
) -> Result<Json<AddTorrentResponse>, StatusCode> {
    authorize(&state, query.t.as_deref()).map_err(reject)?;

    match state.engine.add_magnet(&request.magnet).await {
        Ok(info_hash) => {
            info!(%info_hash, "torrent registered from magnet");
            Ok(Json(AddTorrentResponse {
                info_hash: info_hash.to_string(),
            }))
        }
        Err(e) => {
            info!(error = %e, "magnet registration rejected");
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// `GET /api/torrents/{info_hash}/stream-url` -- token-bearing stream URL.
pub async fn api_stream_url(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    Query(query): Query<StreamUrlQuery>,
) -> Result<Json<StreamUrlResponse>, StatusCode> {
    authorize(&state, query.t.as_deref()).map_err(reject)?;
    let info_hash = parse_info_hash(&info_hash)?;

    let token = state
        .config
        .server
        .stream_token
        .as_deref()
        .unwrap_or_default();
    let url = format!(
        "http://127.0.0.1:{}/stream/{}/{}?t={}",
        state.config.server.port, info_hash, query.file_index, token
    );
    Ok(Json(StreamUrlResponse { url }))
}

fn parse_info_hash(hex_str: &str) -> Result<InfoHash, StatusCode> {
    InfoHash::from_hex(hex_str).map_err(|_| StatusCode::BAD_REQUEST)
}

fn reject(error: StreamError) -> StatusCode {
    match error {
        StreamError::Unauthorized => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
