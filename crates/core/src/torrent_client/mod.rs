//! Torrent client gateway.
//!
//! This module provides a `TorrentClient` trait for the session-authenticated
//! torrent client API, the qBittorrent implementation, and the client-side
//! completion filter.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
