//! Undertow Web - Loopback HTTP surface over the streaming core
//!
//! Serves torrent payload files as progressively-downloadable HTTP media
//! resources and exposes the JSON control API the player UI drives:
//! status polling, playback pulses, file listings, and magnet registration.

pub mod handlers;
pub mod server;

pub use server::{AppState, router, run_server};
