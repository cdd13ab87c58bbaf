//! Types for torrent client operations.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Client-reported states in which a torrent is not finalized even at 100%.
pub const TRANSITIONAL_STATES: &[&str] = &[
    "checkingDL",
    "checkingUP",
    "checkingResumeData",
    "moving",
    "metaDL",
    "allocating",
];

/// Suffix qBittorrent appends to files that are still being downloaded.
pub const INCOMPLETE_FILE_SUFFIX: &str = ".!qB";

/// Errors that can occur during torrent client operations.
#[derive(Debug, Clone, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Malformed response: {0}")]
    Protocol(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Request timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TorrentClientError {
    /// Whether the session is missing or was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// Whether the failure happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout)
    }
}

/// A torrent as listed by the client. Snapshot of a single poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Torrent {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    /// Category/label, empty when unset.
    pub category: String,
    /// Raw client state (e.g. "uploading", "stalledUP", "checkingUP").
    pub state: String,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    pub save_path: PathBuf,
    /// Root the file listing is relative to.
    pub content_path: PathBuf,
    /// Total size in bytes.
    pub size: u64,
    /// Completed bytes.
    pub completed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Torrent {
    /// Fully downloaded and finalized by the client.
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0 && !is_transitional_state(&self.state)
    }

    /// First eight characters of the hash, for log lines.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..8).unwrap_or(&self.hash)
    }
}

/// A file inside a torrent. Never cached across polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Path relative to the torrent's content root.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Per-file progress (0.0 - 1.0).
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_seed: bool,
}

impl TorrentFile {
    /// File still carries the client's in-progress marker.
    pub fn is_incomplete(&self) -> bool {
        self.name.ends_with(INCOMPLETE_FILE_SUFFIX)
    }
}

/// Check whether a client state is transitional.
pub fn is_transitional_state(state: &str) -> bool {
    TRANSITIONAL_STATES.contains(&state)
}

/// Select torrents in `category` that are complete.
///
/// Done client-side so the result does not depend on how the server
/// interprets its own `filter=completed` parameter.
pub fn filter_completed_torrents(torrents: Vec<Torrent>, category: &str) -> Vec<Torrent> {
    torrents
        .into_iter()
        .filter(|t| t.category == category && t.is_complete())
        .collect()
}

/// Trait for torrent client backends.
///
/// Every call races the cancellation token and returns
/// [`TorrentClientError::Cancelled`] once it fires.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Establish (or re-establish) a session.
    async fn login(&self, cancel: &CancellationToken) -> Result<(), TorrentClientError>;

    /// List every torrent visible to the account.
    async fn list_all_torrents(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Torrent>, TorrentClientError>;

    /// List the files of one torrent.
    async fn files_by_hash(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<TorrentFile>, TorrentClientError>;

    /// Remove a torrent.
    /// If `delete_files` is true, also delete downloaded files.
    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
        cancel: &CancellationToken,
    ) -> Result<(), TorrentClientError>;
}
