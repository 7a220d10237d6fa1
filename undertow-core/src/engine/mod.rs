//! External download engine collaborator interface.
//!
//! Undertow never talks to the swarm itself. Everything it needs from the
//! download engine -- layout metadata, piece availability, deadline hints,
//! transfer statistics -- goes through the [`SwarmEngine`] trait so the
//! engine can be substituted with a fake in tests and with an in-memory
//! implementation in development mode.

pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use memory::InMemorySwarmEngine;

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary from a torrent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Parses a 40-character hex string into an InfoHash.
    ///
    /// # Errors
    /// - `EngineError::InvalidInfoHash` - Wrong length or non-hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self, EngineError> {
        if hex_str.len() != 40 {
            return Err(EngineError::InvalidInfoHash {
                reason: format!("expected 40 hex characters, got {}", hex_str.len()),
            });
        }

        let mut hash = [0u8; 20];
        for (i, chunk) in hex_str.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| EngineError::InvalidInfoHash {
                reason: "non-ASCII character in hash".to_string(),
            })?;
            hash[i] = u8::from_str_radix(pair, 16).map_err(|_| EngineError::InvalidInfoHash {
                reason: format!("invalid hex digit in {pair:?}"),
            })?;
        }
        Ok(Self(hash))
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for InfoHash {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Zero-based index of a piece within a torrent's aggregate byte space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceIndex(pub u32);

impl PieceIndex {
    /// Creates PieceIndex from zero-based index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying piece index as u32.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One file within a torrent's piece-indexed byte space.
///
/// `offset` is the absolute byte position where this file begins within the
/// torrent; files are laid out back to back, so
/// `offset(i + 1) == offset(i) + size(i)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFileEntry {
    /// Zero-based file index within the torrent
    pub index: u32,
    /// Path relative to the engine's download root
    pub relative_path: String,
    /// File size in bytes
    pub size: u64,
    /// Absolute byte offset of the file within the torrent
    pub offset: u64,
}

/// Snapshot of a torrent's file table and piece geometry.
///
/// Obtained from the engine once per request and never refreshed
/// mid-request, so offset-to-piece translation stays referentially
/// consistent even if the engine re-announces metadata concurrently.
#[derive(Debug, Clone)]
pub struct TorrentLayout {
    /// Files in torrent order, offsets monotonically increasing
    pub files: Vec<TorrentFileEntry>,
    /// Fixed piece length in bytes for the whole torrent
    pub piece_length: u32,
}

impl TorrentLayout {
    /// Looks up a file entry by its torrent-level index.
    pub fn file(&self, index: u32) -> Option<&TorrentFileEntry> {
        self.files.get(index as usize)
    }

    /// Number of files in the torrent.
    pub fn file_count(&self) -> u32 {
        self.files.len() as u32
    }

    /// Maps an absolute torrent byte offset to its containing piece.
    pub fn piece_for_offset(&self, absolute_offset: u64) -> PieceIndex {
        PieceIndex::new((absolute_offset / u64::from(self.piece_length)) as u32)
    }
}

/// Aggregate transfer statistics reported by the engine for one torrent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferStats {
    /// Download progress fraction in [0.0, 1.0]
    pub progress: f64,
    /// Payload download rate in bytes per second
    pub download_rate: u64,
    /// Payload upload rate in bytes per second
    pub upload_rate: u64,
    /// Known seeds for this torrent
    pub seeds: u32,
    /// Connected peers for this torrent
    pub peers: u32,
}

/// Errors reported by the download engine collaborator.
///
/// These never cross the HTTP boundary directly; the core converts each
/// kind into a [`StreamError`](crate::StreamError) or absorbs it entirely
/// (deadline hints are advisory and best-effort).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("torrent {info_hash} not found")]
    TorrentNotFound { info_hash: InfoHash },

    #[error("metadata for {info_hash} has not arrived yet")]
    MetadataPending { info_hash: InfoHash },

    #[error("piece {index} out of bounds")]
    InvalidPieceIndex { index: PieceIndex },

    #[error("invalid info hash: {reason}")]
    InvalidInfoHash { reason: String },

    #[error("invalid magnet link: {reason}")]
    InvalidMagnet { reason: String },

    #[error("deadline request rejected: {reason}")]
    ScheduleRejected { reason: String },
}

/// Abstract interface over the external torrent download engine.
///
/// Implementations own all swarm state: the torrent table, the per-torrent
/// piece bitfield, and the deadline queue. Undertow only reads metadata and
/// submits priority hints; it never mutates piece data.
#[async_trait]
pub trait SwarmEngine: Send + Sync {
    /// Lists the info hashes of all torrents known to the engine.
    async fn torrents(&self) -> Vec<InfoHash>;

    /// Returns the file table and piece geometry for a torrent.
    ///
    /// # Errors
    /// - `EngineError::TorrentNotFound` - Unknown info hash
    /// - `EngineError::MetadataPending` - Torrent known but metadata absent
    async fn layout(&self, info_hash: InfoHash) -> Result<TorrentLayout, EngineError>;

    /// Reports whether a piece has been fully downloaded and verified.
    ///
    /// Pieces are binary have/not-have; there is no partial credit.
    ///
    /// # Errors
    /// - `EngineError::TorrentNotFound` - Unknown info hash
    async fn has_piece(
        &self,
        info_hash: InfoHash,
        piece: PieceIndex,
    ) -> Result<bool, EngineError>;

    /// Asks the engine to complete a piece within the given deadline.
    ///
    /// Deadlines are advisory fetch-ordering hints, not reservations; they
    /// naturally expire as newer windows are scheduled.
    ///
    /// # Errors
    /// - `EngineError::TorrentNotFound` - Unknown info hash
    /// - `EngineError::ScheduleRejected` - Engine refused the hint
    async fn request_piece_deadline(
        &self,
        info_hash: InfoHash,
        piece: PieceIndex,
        deadline: Duration,
    ) -> Result<(), EngineError>;

    /// Returns aggregate transfer statistics for a torrent.
    ///
    /// # Errors
    /// - `EngineError::TorrentNotFound` - Unknown info hash
    async fn transfer_stats(&self, info_hash: InfoHash) -> Result<TransferStats, EngineError>;

    /// Registers a torrent from a magnet link, returning its info hash.
    ///
    /// Metadata arrives asynchronously; `layout` reports
    /// `MetadataPending` until it does.
    ///
    /// # Errors
    /// - `EngineError::InvalidMagnet` - Malformed magnet URI
    async fn add_magnet(&self, magnet_link: &str) -> Result<InfoHash, EngineError>;
}
