//! Torrent layout resolution into per-request stream contexts.
//!
//! Maps a (torrent, file selector) pair onto a [`StreamContext`]: the
//! file's position within the torrent's piece-indexed byte space, snapshot
//! once so a single request never observes two different layouts.

use crate::engine::{InfoHash, PieceIndex, SwarmEngine, TorrentFileEntry, TorrentLayout};
use crate::{Result, StreamError};

/// File extensions accepted by the legacy largest-video heuristic.
const VIDEO_EXTENSIONS: [&str; 3] = [".mp4", ".mkv", ".avi"];

/// How to pick a file out of a multi-file torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSelector {
    /// Strict mode: exact torrent-level file index.
    Index(u32),
    /// Deprecated legacy mode: largest file with a recognized video
    /// extension, ties broken by torrent order. Retained only for callers
    /// that never learned file indices.
    LargestVideo,
}

/// Resolved binding of a request to one file inside one torrent.
///
/// Owned exclusively by the request that created it and discarded when the
/// request completes. The embedded file entry and piece length are a
/// snapshot; concurrent metadata re-announces do not affect an in-flight
/// request.
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub info_hash: InfoHash,
    pub file: TorrentFileEntry,
    pub piece_length: u32,
}

impl StreamContext {
    /// Absolute torrent byte offset for a byte offset within the file.
    pub fn absolute_offset(&self, offset_within_file: u64) -> u64 {
        self.file.offset + offset_within_file
    }

    /// Piece containing the given byte offset within the file.
    pub fn piece_for_file_offset(&self, offset_within_file: u64) -> PieceIndex {
        PieceIndex::new((self.absolute_offset(offset_within_file) / u64::from(self.piece_length)) as u32)
    }
}

/// Resolves a torrent and file selector into a [`StreamContext`].
///
/// Purely a lookup against the engine's current metadata snapshot; no side
/// effects. Unknown torrents, pending metadata, and out-of-range indices
/// all collapse to `NotFound` -- the caller re-resolves, it never retries.
///
/// # Errors
/// - `StreamError::NotFound` - Unknown torrent, metadata pending, index out
///   of bounds, or no recognized video file in legacy mode
pub async fn resolve_stream_context(
    engine: &dyn SwarmEngine,
    info_hash: InfoHash,
    selector: FileSelector,
) -> Result<StreamContext> {
    let layout = engine
        .layout(info_hash)
        .await
        .map_err(|e| StreamError::not_found(e.to_string()))?;

    let file = match selector {
        FileSelector::Index(index) => layout
            .file(index)
            .cloned()
            .ok_or_else(|| StreamError::not_found(format!("file index {index} out of bounds")))?,
        FileSelector::LargestVideo => largest_video_file(&layout)
            .cloned()
            .ok_or_else(|| StreamError::not_found("no video file in torrent"))?,
    };

    Ok(StreamContext {
        info_hash,
        file,
        piece_length: layout.piece_length,
    })
}

/// Largest file carrying a recognized video extension, if any.
///
/// Strictly-larger wins, so ties keep the first-encountered file.
pub fn largest_video_file(layout: &TorrentLayout) -> Option<&TorrentFileEntry> {
    let mut best: Option<&TorrentFileEntry> = None;
    for file in &layout.files {
        if !has_video_extension(&file.relative_path) {
            continue;
        }
        if best.is_none_or(|b| file.size > b.size) {
            best = Some(file);
        }
    }
    best
}

fn has_video_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
