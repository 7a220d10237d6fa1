//! Deadline-based piece scheduling ("the brain").
//!
//! Converts a byte window of interest into a bounded run of piece-deadline
//! hints for the download engine: the first few pieces get a short urgent
//! deadline because the player is blocked on them, the rest of the window
//! gets a longer prefetch deadline. Scheduling is advisory and best-effort;
//! it retains no state between calls and never fails the request that
//! triggered it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::engine::{PieceIndex, SwarmEngine};
use crate::resolve::StreamContext;

/// Absolute byte range of interest within the torrent, end inclusive.
///
/// A missing end means "from start to wherever the reader stops", which the
/// scheduler replaces with a bounded look-ahead window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteWindow {
    /// Open-ended window beginning at `start`.
    pub fn from(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Bounded window over `[start, end]`.
    pub fn bounded(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

/// Deadline profile for one scheduling call.
///
/// Reactive scheduling runs off an HTTP read and prefetches tightly behind
/// it; proactive scheduling runs off a playback pulse, reaches further
/// ahead, and is clamped to a maximum piece spread to bound its cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineProfile {
    /// Triggered by an HTTP range read.
    Reactive,
    /// Triggered by a playback-position pulse.
    Proactive,
}

/// Stateless piece scheduler bound to one engine handle.
///
/// Overlapping calls for overlapping windows are commutative: later calls
/// reinforce or extend deadlines the engine already tracks. All scheduling
/// state lives in the engine.
#[derive(Clone)]
pub struct PieceScheduler {
    engine: Arc<dyn SwarmEngine>,
    config: SchedulerConfig,
}

impl PieceScheduler {
    pub fn new(engine: Arc<dyn SwarmEngine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Issues deadline hints for the pieces covering `window`.
    ///
    /// At most `max_pieces_per_call` hints are issued; pieces beyond the
    /// cap are left for a later call as the window advances. Engine errors
    /// are logged and swallowed -- a failed hint must never fail the
    /// surrounding request. Returns the number of hints issued.
    pub async fn schedule(
        &self,
        ctx: &StreamContext,
        window: ByteWindow,
        profile: DeadlineProfile,
    ) -> usize {
        let start = window.start;
        let end = window
            .end
            .unwrap_or_else(|| start.saturating_add(self.config.lookahead_bytes));

        let piece_length = u64::from(ctx.piece_length);
        let start_piece = (start / piece_length) as u32;
        let mut end_piece = (end / piece_length) as u32;

        // The pulse path bounds its aggression by piece spread, not just
        // by the per-call cap.
        if profile == DeadlineProfile::Proactive {
            end_piece = end_piece.min(start_piece.saturating_add(self.config.pulse_max_pieces));
        }

        let prefetch_deadline = match profile {
            DeadlineProfile::Reactive => self.config.reactive_prefetch_deadline,
            DeadlineProfile::Proactive => self.config.proactive_prefetch_deadline,
        };
        let urgent_cutoff =
            start_piece.saturating_add(self.config.urgent_piece_count.saturating_sub(1));

        debug!(
            info_hash = %ctx.info_hash,
            start_piece,
            end_piece,
            ?profile,
            "scheduling piece window"
        );

        let mut issued = 0usize;
        for piece in start_piece..=end_piece {
            if issued >= self.config.max_pieces_per_call as usize {
                break;
            }

            let deadline = if piece <= urgent_cutoff {
                self.config.urgent_deadline
            } else {
                prefetch_deadline
            };

            if let Err(e) = self
                .engine
                .request_piece_deadline(ctx.info_hash, PieceIndex::new(piece), deadline)
                .await
            {
                warn!(
                    info_hash = %ctx.info_hash,
                    piece,
                    error = %e,
                    "piece deadline request failed"
                );
                continue;
            }
            issued += 1;
        }

        issued
    }
}
