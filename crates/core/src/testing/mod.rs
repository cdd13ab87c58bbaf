//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits so
//! the monitor can be exercised end to end against a temporary directory
//! without a running torrent client or media server.
//!
//! # Example
//!
//! ```rust,ignore
//! use qbsync_core::testing::{fixtures, MockTorrentClient, RecordingNotifier};
//!
//! let client = MockTorrentClient::new();
//! let torrent = fixtures::completed_torrent("Movie.X264", "movies", downloads);
//! client.add_torrent(torrent, vec![fixtures::file("a.mkv", 1000)]).await;
//! ```

mod mock_torrent_client;
mod recording;

pub use mock_torrent_client::{MockTorrentClient, RecordedDelete};
pub use recording::{RecordingNotifier, RecordingRefresher};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::torrent_client::{Torrent, TorrentFile};

    /// A finished, seeding torrent whose content lives at `downloads/name`.
    pub fn completed_torrent(name: &str, category: &str, downloads: impl AsRef<Path>) -> Torrent {
        let downloads = downloads.as_ref();
        Torrent {
            hash: hash_for(name),
            name: name.to_string(),
            category: category.to_string(),
            state: "uploading".to_string(),
            progress: 1.0,
            save_path: downloads.to_path_buf(),
            content_path: downloads.join(name),
            size: 0,
            completed: 0,
            completed_at: None,
        }
    }

    /// A torrent file entry.
    pub fn file(name: &str, size: u64) -> TorrentFile {
        TorrentFile {
            name: name.to_string(),
            size,
            progress: 1.0,
            priority: 1,
            is_seed: true,
        }
    }

    /// Deterministic 40-character hex hash derived from a name.
    pub fn hash_for(name: &str) -> String {
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in name.bytes() {
            state ^= u64::from(byte);
            state = state.wrapping_mul(0x0100_0000_01b3);
        }
        format!("{:016x}{:016x}{:08x}", state, state.rotate_left(17), state as u32)
    }
}
