//! In-memory engine implementation for development and tests.
//!
//! Holds layouts, piece bitfields, and transfer statistics in process
//! memory and records every deadline hint it receives, so tests can assert
//! on the exact hint stream the scheduler produced. No networking, no disk.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    EngineError, InfoHash, PieceIndex, SwarmEngine, TorrentFileEntry, TorrentLayout, TransferStats,
};

#[derive(Debug, Default)]
struct TorrentRecord {
    layout: Option<TorrentLayout>,
    have: HashSet<PieceIndex>,
    stats: TransferStats,
}

/// A deadline hint as received by the engine, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedDeadline {
    pub info_hash: InfoHash,
    pub piece: PieceIndex,
    pub deadline: Duration,
}

/// Deterministic in-memory [`SwarmEngine`] implementation.
///
/// Torrents are registered either through `add_magnet` (metadata pending
/// until a layout is installed) or directly via [`insert_torrent`]. Piece
/// availability is flipped explicitly with [`mark_pieces_complete`].
///
/// [`insert_torrent`]: InMemorySwarmEngine::insert_torrent
/// [`mark_pieces_complete`]: InMemorySwarmEngine::mark_pieces_complete
#[derive(Default)]
pub struct InMemorySwarmEngine {
    torrents: RwLock<HashMap<InfoHash, TorrentRecord>>,
    deadlines: RwLock<Vec<RecordedDeadline>>,
}

impl InMemorySwarmEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a torrent with a complete layout.
    pub fn insert_torrent(&self, info_hash: InfoHash, layout: TorrentLayout) {
        let mut torrents = self.torrents.write();
        torrents.insert(
            info_hash,
            TorrentRecord {
                layout: Some(layout),
                ..TorrentRecord::default()
            },
        );
    }

    /// Registers a torrent whose metadata has not arrived yet.
    pub fn insert_pending_torrent(&self, info_hash: InfoHash) {
        self.torrents.write().entry(info_hash).or_default();
    }

    /// Installs metadata for a previously pending torrent.
    pub fn install_layout(&self, info_hash: InfoHash, layout: TorrentLayout) {
        if let Some(record) = self.torrents.write().get_mut(&info_hash) {
            record.layout = Some(layout);
        }
    }

    /// Marks the given pieces as fully downloaded.
    pub fn mark_pieces_complete(
        &self,
        info_hash: InfoHash,
        pieces: impl IntoIterator<Item = u32>,
    ) {
        if let Some(record) = self.torrents.write().get_mut(&info_hash) {
            record.have.extend(pieces.into_iter().map(PieceIndex::new));
        }
    }

    /// Overrides the transfer statistics reported for a torrent.
    pub fn set_transfer_stats(&self, info_hash: InfoHash, stats: TransferStats) {
        if let Some(record) = self.torrents.write().get_mut(&info_hash) {
            record.stats = stats;
        }
    }

    /// Every deadline hint received so far, in arrival order.
    pub fn recorded_deadlines(&self) -> Vec<RecordedDeadline> {
        self.deadlines.read().clone()
    }

    /// Discards the recorded hint history.
    pub fn clear_recorded_deadlines(&self) {
        self.deadlines.write().clear();
    }
}

#[async_trait]
impl SwarmEngine for InMemorySwarmEngine {
    async fn torrents(&self) -> Vec<InfoHash> {
        self.torrents.read().keys().copied().collect()
    }

    async fn layout(&self, info_hash: InfoHash) -> Result<TorrentLayout, EngineError> {
        let torrents = self.torrents.read();
        let record = torrents
            .get(&info_hash)
            .ok_or(EngineError::TorrentNotFound { info_hash })?;
        record
            .layout
            .clone()
            .ok_or(EngineError::MetadataPending { info_hash })
    }

    async fn has_piece(
        &self,
        info_hash: InfoHash,
        piece: PieceIndex,
    ) -> Result<bool, EngineError> {
        let torrents = self.torrents.read();
        let record = torrents
            .get(&info_hash)
            .ok_or(EngineError::TorrentNotFound { info_hash })?;
        Ok(record.have.contains(&piece))
    }

    async fn request_piece_deadline(
        &self,
        info_hash: InfoHash,
        piece: PieceIndex,
        deadline: Duration,
    ) -> Result<(), EngineError> {
        {
            let torrents = self.torrents.read();
            if !torrents.contains_key(&info_hash) {
                return Err(EngineError::TorrentNotFound { info_hash });
            }
        }
        self.deadlines.write().push(RecordedDeadline {
            info_hash,
            piece,
            deadline,
        });
        Ok(())
    }

    async fn transfer_stats(&self, info_hash: InfoHash) -> Result<TransferStats, EngineError> {
        let torrents = self.torrents.read();
        let record = torrents
            .get(&info_hash)
            .ok_or(EngineError::TorrentNotFound { info_hash })?;
        Ok(record.stats)
    }

    async fn add_magnet(&self, magnet_link: &str) -> Result<InfoHash, EngineError> {
        let info_hash = parse_magnet_info_hash(magnet_link)?;
        self.insert_pending_torrent(info_hash);
        Ok(info_hash)
    }
}

/// Extracts the btih info hash from a magnet link.
fn parse_magnet_info_hash(magnet_link: &str) -> Result<InfoHash, EngineError> {
    magnet_url::Magnet::new(magnet_link).map_err(|e| EngineError::InvalidMagnet {
        reason: e.to_string(),
    })?;

    for param in magnet_link.split(['?', '&']) {
        if let Some(hash_str) = param.strip_prefix("xt=urn:btih:") {
            return InfoHash::from_hex(hash_str).map_err(|e| EngineError::InvalidMagnet {
                reason: e.to_string(),
            });
        }
    }

    Err(EngineError::InvalidMagnet {
        reason: "missing xt=urn:btih parameter".to_string(),
    })
}

/// Layout builder for tests and development seeding.
///
/// Accepts `(path, size)` pairs and assigns back-to-back offsets, which is
/// the only legal layout shape.
pub fn build_layout(piece_length: u32, files: &[(&str, u64)]) -> TorrentLayout {
    let mut entries = Vec::with_capacity(files.len());
    let mut offset = 0u64;
    for (index, (path, size)) in files.iter().enumerate() {
        entries.push(TorrentFileEntry {
            index: index as u32,
            relative_path: (*path).to_string(),
            size: *size,
            offset,
        });
        offset += size;
    }
    TorrentLayout {
        files: entries,
        piece_length,
    }
}
