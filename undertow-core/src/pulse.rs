//! Playback-position pulse handling.
//!
//! A pulse is an out-of-band announcement of where the player currently
//! sits -- after a seek, or during steady playback where client-side
//! buffering keeps the playhead well past the last byte actually read over
//! HTTP. Scheduling only off reads would always prefetch strictly behind
//! the playhead; pulses let the scheduler reach ahead of it instead.

use tracing::debug;

use crate::engine::{InfoHash, SwarmEngine};
use crate::resolve::{FileSelector, resolve_stream_context};
use crate::scheduler::{ByteWindow, DeadlineProfile, PieceScheduler};

/// Schedules a proactive look-ahead window from the reported position.
///
/// Resolution is strict (exact file index); an unknown torrent, pending
/// metadata, or out-of-range index makes the pulse not-accepted rather
/// than an error. Returns whether the pulse was accepted.
pub async fn handle_pulse(
    engine: &dyn SwarmEngine,
    scheduler: &PieceScheduler,
    info_hash: InfoHash,
    file_index: u32,
    byte_position: u64,
) -> bool {
    let ctx = match resolve_stream_context(engine, info_hash, FileSelector::Index(file_index)).await
    {
        Ok(ctx) => ctx,
        Err(_) => {
            debug!(%info_hash, file_index, "pulse for unresolvable target dropped");
            return false;
        }
    };

    let window = ByteWindow::from(ctx.absolute_offset(byte_position));
    let issued = scheduler
        .schedule(&ctx, window, DeadlineProfile::Proactive)
        .await;
    debug!(%info_hash, file_index, byte_position, issued, "pulse scheduled");
    true
}
