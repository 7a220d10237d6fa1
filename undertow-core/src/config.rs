//! Centralized configuration for Undertow.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Undertow components.
///
/// Groups related configuration settings into logical sections.
#[derive(Debug, Clone, Default)]
pub struct UndertowConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub library: LibraryConfig,
}

/// HTTP range server configuration.
///
/// The server binds to the loopback interface only; the stream token is
/// generated per session by the caller and compared verbatim on every
/// request when set.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port for the loopback HTTP server
    pub port: u16,
    /// Shared-secret stream token (None disables the check)
    pub stream_token: Option<String>,
    /// Retry hint attached to not-ready responses
    pub retry_after: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            stream_token: None,
            retry_after: Duration::from_secs(1),
        }
    }
}

/// Piece scheduling configuration.
///
/// Controls how byte windows of interest are translated into piece-deadline
/// hints for the download engine.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Look-ahead window substituted for open-ended ranges
    pub lookahead_bytes: u64,
    /// Maximum deadline hints issued by a single scheduling call
    pub max_pieces_per_call: u32,
    /// Number of pieces at the head of a window marked urgent
    pub urgent_piece_count: u32,
    /// Deadline for urgent pieces
    pub urgent_deadline: Duration,
    /// Prefetch deadline when scheduling reacts to an HTTP read
    pub reactive_prefetch_deadline: Duration,
    /// Prefetch deadline when scheduling follows a playback pulse
    pub proactive_prefetch_deadline: Duration,
    /// Maximum piece spread of a single playback pulse
    pub pulse_max_pieces: u32,
    /// Pieces probed by the coarse readiness heuristic
    pub readiness_probe_pieces: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_bytes: 10 * 1024 * 1024, // 10 MiB
            max_pieces_per_call: 64,
            urgent_piece_count: 4,
            urgent_deadline: Duration::from_millis(800),
            reactive_prefetch_deadline: Duration::from_millis(2500),
            proactive_prefetch_deadline: Duration::from_millis(3000),
            pulse_max_pieces: 32,
            readiness_probe_pieces: 3,
        }
    }
}

/// On-disk download library configuration.
///
/// The engine persists torrent payloads below `download_dir`; file paths in
/// a torrent layout are relative to this root.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Root directory holding downloaded torrent payloads
    pub download_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
        }
    }
}
