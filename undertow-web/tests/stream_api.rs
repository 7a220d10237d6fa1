//! End-to-end tests for the range server and control API.
//!
//! Drives the full router with in-process requests against an
//! `InMemorySwarmEngine` and tempdir-backed payload files, covering the
//! streaming state machine (auth, resolve, gate, serve, retry) and the
//! JSON bridge endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;
use undertow_core::UndertowConfig;
use undertow_core::engine::memory::{InMemorySwarmEngine, build_layout};
use undertow_core::engine::{InfoHash, SwarmEngine};
use undertow_core::scheduler::PieceScheduler;
use undertow_web::server::{AppState, router};

const TOKEN: &str = "session-secret";
const PIECE_LENGTH: u32 = 512;

struct Fixture {
    app: Router,
    engine: Arc<InMemorySwarmEngine>,
    hash: InfoHash,
    payload: Vec<u8>,
    download_dir: TempDir,
}

/// One torrent with a small text file followed by a 4 KiB video file,
/// both written to disk. No pieces are marked complete yet.
fn fixture() -> Fixture {
    let download_dir = TempDir::new().unwrap();

    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(download_dir.path().join("sample.txt"), vec![b'x'; 1000]).unwrap();
    std::fs::write(download_dir.path().join("movie.mp4"), &payload).unwrap();

    let engine = Arc::new(InMemorySwarmEngine::new());
    let hash = InfoHash::new([0xab; 20]);
    engine.insert_torrent(
        hash,
        build_layout(PIECE_LENGTH, &[("sample.txt", 1000), ("movie.mp4", 4096)]),
    );

    let mut config = UndertowConfig::default();
    config.server.stream_token = Some(TOKEN.to_string());
    config.library.download_dir = download_dir.path().to_path_buf();
    let config = Arc::new(config);

    let scheduler = PieceScheduler::new(engine.clone(), config.scheduler.clone());
    let state = AppState {
        engine: engine.clone(),
        scheduler,
        config,
    };

    Fixture {
        app: router(state),
        engine,
        hash,
        payload,
        download_dir: download_dir,
    }
}

impl Fixture {
    /// Marks every piece of the torrent complete (2 files, 5096 bytes).
    fn complete_all_pieces(&self) {
        self.engine.mark_pieces_complete(self.hash, 0..10);
    }

    fn stream_uri(&self, file_index: u32) -> String {
        format!("/stream/{}/{}?t={}", self.hash, file_index, TOKEN)
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_range(uri: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Range", range)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn whole_file_served_without_range_header() {
    let fx = fixture();
    fx.complete_all_pieces();

    let (status, headers, body) = send(&fx.app, get(&fx.stream_uri(1))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("Accept-Ranges").unwrap(), "bytes");
    assert_eq!(headers.get("Content-Length").unwrap(), "4096");
    assert_eq!(headers.get("Content-Type").unwrap(), "video/mp4");
    assert!(headers.get("ETag").is_some());
    assert!(headers.get("Content-Range").is_none());
    assert_eq!(body, fx.payload);
}

#[tokio::test]
async fn bounded_range_returns_partial_content() {
    let fx = fixture();
    fx.complete_all_pieces();

    let (status, headers, body) =
        send(&fx.app, get_with_range(&fx.stream_uri(1), "bytes=100-199")).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers.get("Content-Range").unwrap(), "bytes 100-199/4096");
    assert_eq!(headers.get("Content-Length").unwrap(), "100");
    assert_eq!(body, &fx.payload[100..=199]);
}

#[tokio::test]
async fn open_ended_range_serves_to_end_of_file() {
    let fx = fixture();
    fx.complete_all_pieces();

    let (status, headers, body) =
        send(&fx.app, get_with_range(&fx.stream_uri(1), "bytes=4000-")).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers.get("Content-Range").unwrap(), "bytes 4000-4095/4096");
    assert_eq!(body, &fx.payload[4000..]);
}

#[tokio::test]
async fn malformed_range_serves_whole_file() {
    let fx = fixture();
    fx.complete_all_pieces();

    let (status, _, body) =
        send(&fx.app, get_with_range(&fx.stream_uri(1), "bytes=oops-123")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, fx.payload);
}

#[tokio::test]
async fn missing_piece_yields_retry_signal_not_body_bytes() {
    let fx = fixture();
    // Nothing downloaded at all.

    let (status, headers, body) = send(&fx.app, get(&fx.stream_uri(1))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers.get("Retry-After").unwrap(), "1");
    assert_ne!(body, fx.payload);
    // Not-ready must not advance scheduling either.
    assert!(fx.engine.recorded_deadlines().is_empty());
}

#[tokio::test]
async fn ready_request_schedules_ahead_of_the_read() {
    let fx = fixture();
    fx.complete_all_pieces();

    // movie.mp4 starts at absolute offset 1000; byte 100 of it sits in
    // absolute piece (1000 + 100) / 512 = 2.
    send(&fx.app, get_with_range(&fx.stream_uri(1), "bytes=100-")).await;

    let recorded = fx.engine.recorded_deadlines();
    assert!(!recorded.is_empty());
    assert_eq!(recorded[0].piece.as_u32(), 2);
    assert_eq!(recorded[0].deadline, Duration::from_millis(800));
    // Reactive prefetch tail uses the 2.5 s deadline.
    assert_eq!(
        recorded.last().unwrap().deadline,
        Duration::from_millis(2500)
    );
}

#[tokio::test]
async fn wrong_or_missing_token_is_forbidden() {
    let fx = fixture();
    fx.complete_all_pieces();

    let uri = format!("/stream/{}/1?t=wrong", fx.hash);
    let (status, _, _) = send(&fx.app, get(&uri)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/stream/{}/1", fx.hash);
    let (status, _, _) = send(&fx.app, get(&uri)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_torrent_and_bad_index_are_not_found() {
    let fx = fixture();
    fx.complete_all_pieces();

    let unknown = InfoHash::new([0x01; 20]);
    let uri = format!("/stream/{unknown}/0?t={TOKEN}");
    let (status, _, _) = send(&fx.app, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&fx.app, get(&fx.stream_uri(9))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_hash_is_bad_request() {
    let fx = fixture();

    let (status, _, _) = send(&fx.app, get(&format!("/stream/nothex/0?t={TOKEN}"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn range_past_end_of_file_is_not_satisfiable() {
    let fx = fixture();
    fx.complete_all_pieces();

    let (status, headers, _) =
        send(&fx.app, get_with_range(&fx.stream_uri(1), "bytes=4096-")).await;

    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers.get("Content-Range").unwrap(), "bytes */4096");
}

#[tokio::test]
async fn legacy_route_streams_largest_video_file() {
    let fx = fixture();
    fx.complete_all_pieces();

    // sample.txt is excluded by extension, so movie.mp4 wins despite the
    // route carrying no file index.
    let uri = format!("/stream/{}?t={TOKEN}", fx.hash);
    let (status, headers, body) = send(&fx.app, get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("Content-Type").unwrap(), "video/mp4");
    assert_eq!(body, fx.payload);
}

#[tokio::test]
async fn status_endpoint_tracks_readiness() {
    let fx = fixture();

    let uri = format!("/api/torrents/{}/status?t={TOKEN}", fx.hash);
    let (status, _, body) = send(&fx.app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["state"], "buffering");
    assert_eq!(parsed["ready"], false);

    fx.complete_all_pieces();
    let (_, _, body) = send(&fx.app, get(&uri)).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["state"], "ready");
    assert_eq!(parsed["ready"], true);
}

#[tokio::test]
async fn status_for_unknown_torrent_is_idle() {
    let fx = fixture();

    let unknown = InfoHash::new([0x02; 20]);
    let uri = format!("/api/torrents/{unknown}/status?t={TOKEN}");
    let (status, _, body) = send(&fx.app, get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["state"], "idle");
}

#[tokio::test]
async fn control_api_requires_token() {
    let fx = fixture();

    let uri = format!("/api/torrents/{}/status", fx.hash);
    let (status, _, _) = send(&fx.app, get(&uri)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn pulse_schedules_and_reports_acceptance() {
    let fx = fixture();

    let uri = format!("/api/torrents/{}/pulse?t={TOKEN}", fx.hash);
    let body = serde_json::json!({ "file_index": 1, "byte_position": 0 });
    let (status, _, response) = send(&fx.app, post_json(&uri, body)).await;

    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(parsed["accepted"], true);

    let recorded = fx.engine.recorded_deadlines();
    assert!(!recorded.is_empty());
    // Proactive tail deadline distinguishes pulses from reactive reads.
    assert_eq!(
        recorded.last().unwrap().deadline,
        Duration::from_millis(3000)
    );
}

#[tokio::test]
async fn pulse_for_bad_target_is_not_accepted() {
    let fx = fixture();

    let uri = format!("/api/torrents/{}/pulse?t={TOKEN}", fx.hash);
    let body = serde_json::json!({ "file_index": 42, "byte_position": 0 });
    let (status, _, response) = send(&fx.app, post_json(&uri, body)).await;

    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(parsed["accepted"], false);
}

#[tokio::test]
async fn files_endpoint_lists_table_or_empty_when_pending() {
    let fx = fixture();

    let uri = format!("/api/torrents/{}/files?t={TOKEN}", fx.hash);
    let (_, _, body) = send(&fx.app, get(&uri)).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
    assert_eq!(parsed[1]["path"], "movie.mp4");
    assert_eq!(parsed[1]["size"], 4096);

    let pending = InfoHash::new([0x03; 20]);
    fx.engine.insert_pending_torrent(pending);
    let uri = format!("/api/torrents/{pending}/files?t={TOKEN}");
    let (_, _, body) = send(&fx.app, get(&uri)).await;
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(parsed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn add_magnet_then_fetch_stream_url() {
    let fx = fixture();

    let body = serde_json::json!({
        "magnet": "magnet:?xt=urn:btih:00112233445566778899aabbccddeeff00112233&dn=Demo"
    });
    let uri = format!("/api/torrents/add?t={TOKEN}");
    let (status, _, response) = send(&fx.app, post_json(&uri, body)).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&response).unwrap();
    let hash = parsed["info_hash"].as_str().unwrap();
    assert_eq!(hash, "00112233445566778899aabbccddeeff00112233");

    let uri = format!("/api/torrents/{hash}/stream-url?file_index=0&t={TOKEN}");
    let (status, _, response) = send(&fx.app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_slice(&response).unwrap();
    let url = parsed["url"].as_str().unwrap();
    assert!(url.contains(&format!("/stream/{hash}/0?t={TOKEN}")));
}

#[tokio::test]
async fn invalid_magnet_is_bad_request() {
    let fx = fixture();

    let body = serde_json::json!({ "magnet": "magnet:?dn=NoHashHere" });
    let uri = format!("/api/torrents/add?t={TOKEN}");
    let (status, _, _) = send(&fx.app, post_json(&uri, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn etag_changes_when_file_is_replaced() {
    let fx = fixture();
    fx.complete_all_pieces();

    let (_, headers, _) = send(&fx.app, get(&fx.stream_uri(1))).await;
    let first = headers.get("ETag").unwrap().clone();

    // Same path, different size: the stability tag must change.
    std::fs::write(
        fx.download_dir.path().join("movie.mp4"),
        vec![0u8; 2048],
    )
    .unwrap();
    let (_, headers, _) = send(&fx.app, get(&fx.stream_uri(1))).await;
    let second = headers.get("ETag").unwrap().clone();

    assert_ne!(first, second);
}
