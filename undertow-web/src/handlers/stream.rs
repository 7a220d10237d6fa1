//! Streaming endpoint: the per-request range serving state machine.
//!
//! Each request walks ParseRange -> CheckAuth -> Resolve -> Gate ->
//! Serve|Retry. The gate is the authority: if the piece under the requested
//! start offset is not downloaded, the client gets a 503 with a retry hint
//! and zero body bytes -- never a short or zero-filled body. Serving also
//! kicks the piece scheduler so the engine keeps fetching ahead of the
//! read position.

use std::io::SeekFrom;
use std::path::Path as FsPath;
use std::time::UNIX_EPOCH;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Response, StatusCode};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};
use undertow_core::readiness::is_offset_ready;
use undertow_core::resolve::{FileSelector, resolve_stream_context};
use undertow_core::scheduler::{ByteWindow, DeadlineProfile};
use undertow_core::{InfoHash, StreamError};

use super::range::{extract_range_header, parse_range_header};
use crate::server::{AppState, TokenQuery, authorize};

/// Read size for response body chunks.
const BODY_CHUNK_SIZE: u64 = 64 * 1024;

/// `GET /stream/{info_hash}/{file_index}?t={token}` -- strict streaming path.
pub async fn stream_file(
    State(state): State<AppState>,
    Path((info_hash, file_index)): Path<(String, u32)>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response<Body> {
    serve(state, info_hash, FileSelector::Index(file_index), query, headers).await
}

/// `GET /stream/{info_hash}?t={token}` -- deprecated legacy path.
///
/// Retained for callers that never learned file indices; resolves to the
/// largest recognized video file in the torrent.
pub async fn stream_legacy(
    State(state): State<AppState>,
    Path(info_hash): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response<Body> {
    serve(state, info_hash, FileSelector::LargestVideo, query, headers).await
}

async fn serve(
    state: AppState,
    info_hash: String,
    selector: FileSelector,
    query: TokenQuery,
    headers: HeaderMap,
) -> Response<Body> {
    match try_serve(&state, &info_hash, selector, &query, &headers).await {
        Ok(response) => response,
        Err(error) => error_response(&error),
    }
}

async fn try_serve(
    state: &AppState,
    info_hash_str: &str,
    selector: FileSelector,
    query: &TokenQuery,
    headers: &HeaderMap,
) -> Result<Response<Body>, StreamError> {
    authorize(state, query.t.as_deref())?;

    let info_hash =
        InfoHash::from_hex(info_hash_str).map_err(|e| StreamError::MalformedRequest {
            reason: e.to_string(),
        })?;

    // Layout snapshot is taken exactly once here; the rest of the request
    // works off this context even if the engine re-announces metadata.
    let ctx = resolve_stream_context(state.engine.as_ref(), info_hash, selector).await?;

    let path = state.config.library.download_dir.join(&ctx.file.relative_path);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| StreamError::not_found("file not present on disk"))?;

    let window = parse_range_header(extract_range_header(headers));

    let ready = is_offset_ready(state.engine.as_ref(), &ctx, window.start)
        .await
        .map_err(|e| StreamError::not_found(e.to_string()))?;
    if !ready {
        debug!(
            %info_hash,
            piece = %ctx.piece_for_file_offset(window.start),
            "requested piece not downloaded, signalling retry"
        );
        return Err(StreamError::NotReady {
            retry_after: state.config.server.retry_after,
        });
    }

    // Keep the engine fetching ahead of this read. Uses the requested
    // window, not the clamped one: an open end becomes a bounded
    // look-ahead inside the scheduler.
    let interest = ByteWindow {
        start: ctx.absolute_offset(window.start),
        end: window.end.map(|end| ctx.absolute_offset(end)),
    };
    state
        .scheduler
        .schedule(&ctx, interest, DeadlineProfile::Reactive)
        .await;

    let file_size = metadata.len();
    let Some((start, end)) = window.clamp(file_size) else {
        return Ok(range_not_satisfiable(file_size));
    };
    let length = end - start + 1;

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| StreamError::not_found("file not present on disk"))?;
    file.seek(SeekFrom::Start(start))
        .await
        .map_err(|e| StreamError::not_found(format!("seek failed: {e}")))?;

    let etag = compute_etag(&path, &metadata);
    let has_range_header = headers.get("range").is_some();

    let mut response = Response::builder()
        .header("Content-Type", mime_for_path(&ctx.file.relative_path))
        .header("Accept-Ranges", "bytes")
        .header("Content-Length", length.to_string())
        .header("ETag", etag);

    if has_range_header {
        response = response
            .status(StatusCode::PARTIAL_CONTENT)
            .header("Content-Range", format!("bytes {start}-{end}/{file_size}"));
    } else {
        response = response.status(StatusCode::OK);
    }

    let body = Body::from_stream(file_chunks(file, length));
    response
        .body(body)
        .map_err(|e| StreamError::not_found(format!("response build failed: {e}")))
}

/// Streams `length` bytes from an open file in fixed-size chunks.
///
/// Dropping the body (client abort) drops the file handle with it; nothing
/// engine-side needs cancelling since deadlines are advisory.
fn file_chunks(
    file: tokio::fs::File,
    length: u64,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    futures::stream::unfold((file, length), |(mut file, remaining)| async move {
        if remaining == 0 {
            return None;
        }
        let chunk = remaining.min(BODY_CHUNK_SIZE) as usize;
        let mut buffer = vec![0u8; chunk];
        match file.read(&mut buffer).await {
            Ok(0) => None,
            Ok(read) => {
                buffer.truncate(read);
                Some((Ok(Bytes::from(buffer)), (file, remaining - read as u64)))
            }
            Err(e) => Some((Err(e), (file, 0))),
        }
    })
}

/// Stability tag over path, modification time, and size.
///
/// Changes whenever the underlying file is replaced, so client-side caches
/// never revalidate stale slices against a new payload.
fn compute_etag(path: &FsPath, metadata: &std::fs::Metadata) -> String {
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut hasher = Sha1::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(mtime.to_le_bytes());
    hasher.update(metadata.len().to_le_bytes());
    let digest = hasher.finalize();
    format!("\"{}\"", hex::encode(&digest[..8]))
}

/// Container-level MIME selection from the file extension.
///
/// Matroska gets its own type, everything else is served as MP4 video.
/// No content sniffing.
fn mime_for_path(path: &str) -> &'static str {
    if path.to_ascii_lowercase().ends_with(".mkv") {
        "video/x-matroska"
    } else {
        "video/mp4"
    }
}

fn range_not_satisfiable(file_size: u64) -> Response<Body> {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header("Content-Range", format!("bytes */{file_size}"))
        .body(Body::from("Requested Range Not Satisfiable"))
        .unwrap_or_else(|_| fallback_response())
}

/// Maps a [`StreamError`] onto its HTTP representation.
///
/// `NotReady` is the one retryable outcome and the single most important
/// contract of this surface: it must reach the player as "poll again", so
/// it carries a Retry-After hint and is never folded into 404 or 500.
pub(crate) fn error_response(error: &StreamError) -> Response<Body> {
    let builder = Response::builder();
    let result = match error {
        StreamError::Unauthorized => {
            warn!("rejected stream request with bad or missing token");
            builder
                .status(StatusCode::FORBIDDEN)
                .body(Body::from("Forbidden"))
        }
        StreamError::NotFound { reason } => {
            debug!(reason, "stream target not found");
            builder
                .status(StatusCode::NOT_FOUND)
                .body(Body::from("File Not Found (or metadata missing)"))
        }
        StreamError::NotReady { retry_after } => builder
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .header("Retry-After", retry_after.as_secs().max(1).to_string())
            .body(Body::from("Buffering...")),
        StreamError::MalformedRequest { reason } => {
            debug!(reason, "malformed stream request");
            builder
                .status(StatusCode::BAD_REQUEST)
                .body(Body::from("Invalid stream URL"))
        }
        StreamError::Engine(e) => {
            warn!(error = %e, "engine error reached the stream handler");
            builder
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Engine error"))
        }
    };
    result.unwrap_or_else(|_| fallback_response())
}

fn fallback_response() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkv_maps_to_matroska_everything_else_to_mp4() {
        assert_eq!(mime_for_path("Show.S01E01.MKV"), "video/x-matroska");
        assert_eq!(mime_for_path("movie.mp4"), "video/mp4");
        assert_eq!(mime_for_path("old.avi"), "video/mp4");
    }

    #[test]
    fn not_ready_response_carries_retry_after() {
        let response = error_response(&StreamError::not_ready());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "1");
    }

    #[test]
    fn not_found_and_not_ready_stay_distinct() {
        let not_found = error_response(&StreamError::not_found("gone"));
        let not_ready = error_response(&StreamError::not_ready());
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(not_found.headers().get("Retry-After").is_none());
    }
}
