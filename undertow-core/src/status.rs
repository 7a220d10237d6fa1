//! Coarse torrent status aggregation for UI polling.
//!
//! Predates per-file stream selection: the readiness probe always runs
//! against the heuristically-largest video file, independent of whichever
//! file a client is actually streaming. Exists for coarse UI feedback only.

use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::engine::{EngineError, InfoHash, SwarmEngine};
use crate::resolve::largest_video_file;

/// Coarse lifecycle state of a torrent as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TorrentState {
    /// Torrent unknown to the engine
    #[serde(rename = "idle")]
    Idle,
    /// Known, metadata not yet arrived
    #[serde(rename = "metaDL")]
    MetadataDownload,
    /// Metadata present, readiness heuristic not evaluable
    #[serde(rename = "downloading")]
    Downloading,
    /// Initial pieces of the main video file still missing
    #[serde(rename = "buffering")]
    Buffering,
    /// Initial pieces present, playback can start
    #[serde(rename = "ready")]
    Ready,
}

/// Status snapshot returned to UI pollers.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentStatus {
    pub state: TorrentState,
    pub progress: f64,
    pub ready: bool,
    pub seeds: u32,
    pub peers: u32,
    pub download_rate: u64,
    pub upload_rate: u64,
}

impl TorrentStatus {
    fn idle() -> Self {
        Self {
            state: TorrentState::Idle,
            progress: 0.0,
            ready: false,
            seeds: 0,
            peers: 0,
            download_rate: 0,
            upload_rate: 0,
        }
    }
}

/// Derives a [`TorrentStatus`] from engine-reported progress.
///
/// Unknown torrents yield the idle status rather than an error; the UI
/// polls this endpoint before, during, and after a torrent's lifetime.
pub async fn aggregate_status(
    engine: &dyn SwarmEngine,
    config: &SchedulerConfig,
    info_hash: InfoHash,
) -> TorrentStatus {
    let stats = match engine.transfer_stats(info_hash).await {
        Ok(stats) => stats,
        Err(_) => return TorrentStatus::idle(),
    };

    let mut status = TorrentStatus {
        state: TorrentState::Downloading,
        progress: stats.progress,
        ready: false,
        seeds: stats.seeds,
        peers: stats.peers,
        download_rate: stats.download_rate,
        upload_rate: stats.upload_rate,
    };

    let layout = match engine.layout(info_hash).await {
        Ok(layout) => layout,
        Err(EngineError::MetadataPending { .. }) => {
            status.state = TorrentState::MetadataDownload;
            return status;
        }
        Err(_) => return TorrentStatus::idle(),
    };

    // Readiness probe over the first pieces of the main video file. Without
    // a recognized video file the heuristic is not evaluable and the state
    // stays at the engine-level "downloading".
    let Some(file) = largest_video_file(&layout) else {
        return status;
    };

    let start_piece = layout.piece_for_offset(file.offset);
    let mut buffered = true;
    for step in 0..config.readiness_probe_pieces {
        let piece = crate::engine::PieceIndex::new(start_piece.as_u32() + step);
        match engine.has_piece(info_hash, piece).await {
            Ok(true) => {}
            _ => {
                buffered = false;
                break;
            }
        }
    }

    if buffered {
        status.ready = true;
        status.state = TorrentState::Ready;
    } else {
        status.state = TorrentState::Buffering;
    }
    status
}
