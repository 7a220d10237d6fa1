//! Undertow Core - Streaming scheduler over an external torrent engine
//!
//! This crate provides the building blocks that turn a piece-based torrent
//! download engine into a progressively-readable media source: per-request
//! file resolution, piece readiness checks, deadline-based piece scheduling,
//! playback-position pulses, and coarse status aggregation.
//!
//! The download engine itself (peer wire protocol, disk persistence, piece
//! verification) is an external collaborator accessed through the
//! [`SwarmEngine`](engine::SwarmEngine) trait.

pub mod config;
pub mod engine;
pub mod pulse;
pub mod readiness;
pub mod resolve;
pub mod scheduler;
pub mod status;

use std::time::Duration;

// Re-export main types for convenient access
pub use config::UndertowConfig;
pub use engine::{EngineError, InfoHash, PieceIndex, SwarmEngine, TorrentLayout};
pub use resolve::{FileSelector, StreamContext};
pub use scheduler::{DeadlineProfile, PieceScheduler};

/// Failures a streaming request can surface to its caller.
///
/// Every engine interaction is converted to one of these kinds at the core
/// boundary; raw engine errors never reach the HTTP layer. `NotReady` is the
/// only retryable kind and must never be conflated with `NotFound` -- a
/// player treats the former as "poll again" and the latter as a hard stop.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("missing or mismatched stream token")]
    Unauthorized,

    #[error("stream target not found: {reason}")]
    NotFound { reason: String },

    #[error("requested data not yet downloaded")]
    NotReady { retry_after: Duration },

    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl StreamError {
    /// Not-ready signal with the standard one second retry hint.
    pub fn not_ready() -> Self {
        StreamError::NotReady {
            retry_after: Duration::from_secs(1),
        }
    }

    /// Not-found failure with a human-readable reason.
    pub fn not_found(reason: impl Into<String>) -> Self {
        StreamError::NotFound {
            reason: reason.into(),
        }
    }

    /// True when the caller should retry the same request after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::NotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
