//! Piece readiness gate.
//!
//! Decides whether a byte offset inside a resolved file is safe to serve:
//! the piece containing it must be fully downloaded. Availability changes
//! asynchronously as the engine downloads, so the answer is computed fresh
//! for every request and never cached.

use crate::engine::{EngineError, SwarmEngine};
use crate::resolve::StreamContext;

/// Reports whether the piece covering `offset_within_file` is downloaded.
///
/// A piece is binary have/not-have; a partially downloaded piece is not
/// safe to serve and counts as not ready.
///
/// # Errors
/// - `EngineError::TorrentNotFound` - Torrent vanished since resolution
pub async fn is_offset_ready(
    engine: &dyn SwarmEngine,
    ctx: &StreamContext,
    offset_within_file: u64,
) -> Result<bool, EngineError> {
    let piece = ctx.piece_for_file_offset(offset_within_file);
    engine.has_piece(ctx.info_hash, piece).await
}
