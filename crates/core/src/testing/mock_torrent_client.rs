//! Mock torrent client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::torrent_client::{Torrent, TorrentClient, TorrentClientError, TorrentFile};

/// A recorded delete call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDelete {
    pub hash: String,
    pub delete_files: bool,
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Seed torrents and their file listings
/// - Fail a number of logins before succeeding
/// - Inject errors per operation
/// - Slow down listing to exercise cancellation
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_torrent(torrent, vec![file("a.mkv", 1000)]).await;
/// client.fail_logins(2);
///
/// // ... run the monitor ...
///
/// assert_eq!(client.deleted().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    /// Listed torrents, in insertion order.
    torrents: Arc<RwLock<Vec<Torrent>>>,
    /// File listings by hash.
    files: Arc<RwLock<HashMap<String, Vec<TorrentFile>>>>,
    /// Recorded delete calls.
    deleted: Arc<RwLock<Vec<RecordedDelete>>>,
    /// Recorded files_by_hash calls.
    file_requests: Arc<RwLock<Vec<String>>>,
    /// Queued listing failures, consumed one per call.
    list_errors: Arc<RwLock<VecDeque<TorrentClientError>>>,
    /// One-shot errors for files_by_hash, by hash.
    files_errors: Arc<RwLock<HashMap<String, TorrentClientError>>>,
    /// One-shot errors for delete_torrent, by hash.
    delete_errors: Arc<RwLock<HashMap<String, TorrentClientError>>>,
    /// Remaining logins that fail.
    failing_logins: AtomicUsize,
    login_calls: AtomicUsize,
    list_calls: AtomicUsize,
    list_delay: RwLock<Option<Duration>>,
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a torrent with its file listing.
    pub async fn add_torrent(&self, torrent: Torrent, files: Vec<TorrentFile>) {
        self.files.write().await.insert(torrent.hash.clone(), files);
        self.torrents.write().await.push(torrent);
    }

    /// Whether the torrent is still listed.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.iter().any(|t| t.hash == hash)
    }

    /// Make the next `count` logins fail with an authentication error.
    pub fn fail_logins(&self, count: usize) {
        self.failing_logins.store(count, Ordering::SeqCst);
    }

    /// Queue a listing failure. Calling it n times fails the next n listings.
    pub async fn fail_next_list(&self, error: TorrentClientError) {
        self.list_errors.write().await.push_back(error);
    }

    /// Make the next file listing for `hash` fail.
    pub async fn fail_files(&self, hash: &str, error: TorrentClientError) {
        self.files_errors
            .write()
            .await
            .insert(hash.to_string(), error);
    }

    /// Make the next delete of `hash` fail.
    pub async fn fail_delete(&self, hash: &str, error: TorrentClientError) {
        self.delete_errors
            .write()
            .await
            .insert(hash.to_string(), error);
    }

    /// Delay every listing, racing the cancellation token.
    pub async fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.write().await = Some(delay);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Get all recorded delete calls.
    pub async fn deleted(&self) -> Vec<RecordedDelete> {
        self.deleted.read().await.clone()
    }

    /// Get all hashes whose files were requested.
    pub async fn file_requests(&self) -> Vec<String> {
        self.file_requests.read().await.clone()
    }

    fn check_cancelled(cancel: &CancellationToken) -> Result<(), TorrentClientError> {
        if cancel.is_cancelled() {
            Err(TorrentClientError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn login(&self, cancel: &CancellationToken) -> Result<(), TorrentClientError> {
        Self::check_cancelled(cancel)?;
        self.login_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failing_logins.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_logins.store(remaining - 1, Ordering::SeqCst);
            return Err(TorrentClientError::AuthenticationFailed(
                "invalid credentials".to_string(),
            ));
        }
        Ok(())
    }

    async fn list_all_torrents(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Torrent>, TorrentClientError> {
        Self::check_cancelled(cancel)?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.list_delay.read().await;
        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TorrentClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if let Some(err) = self.list_errors.write().await.pop_front() {
            return Err(err);
        }
        Ok(self.torrents.read().await.clone())
    }

    async fn files_by_hash(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<TorrentFile>, TorrentClientError> {
        Self::check_cancelled(cancel)?;
        self.file_requests.write().await.push(hash.to_string());

        if let Some(err) = self.files_errors.write().await.remove(hash) {
            return Err(err);
        }
        self.files
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
        cancel: &CancellationToken,
    ) -> Result<(), TorrentClientError> {
        Self::check_cancelled(cancel)?;
        self.deleted.write().await.push(RecordedDelete {
            hash: hash.to_string(),
            delete_files,
        });

        if let Some(err) = self.delete_errors.write().await.remove(hash) {
            return Err(err);
        }

        let mut torrents = self.torrents.write().await;
        let before = torrents.len();
        torrents.retain(|t| t.hash != hash);
        if torrents.len() == before {
            return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
        }
        self.files.write().await.remove(hash);
        Ok(())
    }
}
