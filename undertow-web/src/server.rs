//! Loopback HTTP server wiring.
//!
//! Binds to 127.0.0.1 only -- the stream surface is for a co-resident
//! player, never the network. The per-session stream token and the bound
//! port are fixed at startup and read-only afterwards.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing::info;
use undertow_core::scheduler::PieceScheduler;
use undertow_core::{StreamError, SwarmEngine, UndertowConfig};

use crate::handlers::{
    api_add_torrent, api_files, api_pulse, api_status, api_stream_url, stream_file, stream_legacy,
};

/// Shared state handed to every request handler.
///
/// The engine is the process-wide collaborator handle, passed in rather
/// than reached for as a singleton; everything else is immutable
/// configuration.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn SwarmEngine>,
    pub scheduler: PieceScheduler,
    pub config: Arc<UndertowConfig>,
}

/// Token query parameter shared by all endpoints.
#[derive(Debug, serde::Deserialize)]
pub struct TokenQuery {
    pub t: Option<String>,
}

/// Verifies the request token against the configured stream token.
///
/// A missing configured token disables the check entirely; a configured
/// token must match verbatim, and an absent parameter counts as a
/// mismatch.
pub fn authorize(state: &AppState, provided: Option<&str>) -> Result<(), StreamError> {
    match state.config.server.stream_token.as_deref() {
        None => Ok(()),
        Some(expected) if provided == Some(expected) => Ok(()),
        Some(_) => Err(StreamError::Unauthorized),
    }
}

/// Builds the application router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Streaming endpoints; the index-less route is deprecated legacy
        // surface kept for callers that never learned file indices.
        .route("/stream/{info_hash}/{file_index}", get(stream_file))
        .route("/stream/{info_hash}", get(stream_legacy))
        // JSON control API (the UI-facing bridge)
        .route("/api/torrents/add", post(api_add_torrent))
        .route("/api/torrents/{info_hash}/status", get(api_status))
        .route("/api/torrents/{info_hash}/files", get(api_files))
        .route("/api/torrents/{info_hash}/pulse", post(api_pulse))
        .route("/api/torrents/{info_hash}/stream-url", get(api_stream_url))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the loopback server until the process exits.
///
/// Generates a fresh session token when none is configured, so an
/// unconfigured server is still never open to tokenless requests.
pub async fn run_server(
    mut config: UndertowConfig,
    engine: Arc<dyn SwarmEngine>,
) -> std::io::Result<()> {
    if config.server.stream_token.is_none() {
        let token = uuid::Uuid::new_v4().to_string();
        info!(%token, "generated session stream token");
        config.server.stream_token = Some(token);
    }

    let config = Arc::new(config);
    let scheduler = PieceScheduler::new(engine.clone(), config.scheduler.clone());
    let state = AppState {
        engine,
        scheduler,
        config: config.clone(),
    };

    let addr = format!("127.0.0.1:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "undertow range server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
