//! Types for the monitor.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::torrent_client::TorrentClientError;

/// Errors that stop a tick or the monitor itself.
///
/// Per-torrent failures are not errors at this level; they are recorded in
/// the [`TickReport`].
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Listing torrents failed.
    #[error("failed to list torrents: {0}")]
    Listing(#[source] TorrentClientError),

    /// Cancellation fired.
    #[error("monitor cancelled")]
    Cancelled,

    /// The poll interval is zero or too large to schedule.
    #[error("poll interval of {0} seconds cannot be scheduled")]
    InvalidInterval(u64),
}

/// What happened to the torrent entry in the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum Deletion {
    /// Deletion is switched off.
    Disabled,
    /// Some file failed, the torrent stays.
    Kept,
    /// Dry run: the torrent would have been deleted.
    WouldDelete,
    Deleted,
    Failed(String),
    /// Cancellation fired before all files were handled.
    Interrupted,
}

/// Outcome of processing one completed torrent.
#[derive(Debug, Clone, Serialize)]
pub struct TorrentReport {
    pub hash: String,
    pub name: String,
    pub files: usize,
    /// Files placed, already present, or (dry run) would be placed.
    pub processed: usize,
    pub failed: usize,
    /// Files skipped for carrying the incomplete marker.
    pub skipped: usize,
    /// No file failed. True for a torrent without files.
    pub all_success: bool,
    pub deletion: Deletion,
    /// Set when the file listing could not be fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TorrentReport {
    pub(crate) fn new(hash: &str, name: &str) -> Self {
        Self {
            hash: hash.to_string(),
            name: name.to_string(),
            files: 0,
            processed: 0,
            failed: 0,
            skipped: 0,
            all_success: true,
            deletion: Deletion::Disabled,
            error: None,
        }
    }
}

/// Summary of one reconciliation tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    /// Torrents returned by the listing.
    pub torrents_seen: usize,
    /// Completed torrents in the configured category.
    pub completed: usize,
    pub torrents: Vec<TorrentReport>,
    /// Directories handed to the library refresher, in order.
    pub refreshed: Vec<PathBuf>,
    pub refresh_failures: usize,
}

impl TickReport {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Utc::now(),
            torrents_seen: 0,
            completed: 0,
            torrents: Vec::new(),
            refreshed: Vec::new(),
            refresh_failures: 0,
        }
    }

    pub fn deleted(&self) -> usize {
        self.torrents
            .iter()
            .filter(|t| t.deletion == Deletion::Deleted)
            .count()
    }

    pub fn failed_files(&self) -> usize {
        self.torrents.iter().map(|t| t.failed).sum()
    }
}

/// Observable state of the monitor, published after every change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStatus {
    pub category: String,
    pub dry_run: bool,
    pub logged_in: bool,
    pub login_attempts: u64,
    pub ticks_ok: u64,
    pub ticks_failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Delay the next failure would wait, in seconds.
    pub backoff_secs: u64,
    pub torrents_deleted: u64,
    pub stopped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_serialization() {
        let value = serde_json::to_value(Deletion::Failed("HTTP 500".to_string())).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["error"], "HTTP 500");

        let value = serde_json::to_value(Deletion::Deleted).unwrap();
        assert_eq!(value["outcome"], "deleted");
    }

    #[test]
    fn test_tick_report_counters() {
        let mut report = TickReport::new();
        let mut a = TorrentReport::new("aaa", "A");
        a.deletion = Deletion::Deleted;
        let mut b = TorrentReport::new("bbb", "B");
        b.failed = 2;
        b.all_success = false;
        b.deletion = Deletion::Kept;
        report.torrents = vec![a, b];

        assert_eq!(report.deleted(), 1);
        assert_eq!(report.failed_files(), 2);
    }
}
