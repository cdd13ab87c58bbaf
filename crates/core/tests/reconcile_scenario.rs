//! End-to-end reconciliation tests.
//!
//! These tests drive a full tick against the mock torrent client and a real
//! temporary directory tree:
//! - Completed torrent with an incomplete piece file
//! - Flattened and subfolder-preserving layouts
//! - Category and transitional-state filtering
//! - Copy mode and repeated ticks

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use qbsync_core::{
    monitor::Deletion,
    notify::NotificationEvent,
    testing::{fixtures, MockTorrentClient, RecordedDelete, RecordingNotifier, RecordingRefresher},
    Monitor, MonitorConfig, Operation, Torrent,
};

/// Test helper wiring a monitor to mocks over a temp dir.
struct TestHarness {
    temp_dir: TempDir,
    client: Arc<MockTorrentClient>,
    refresher: Arc<RecordingRefresher>,
    notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            client: Arc::new(MockTorrentClient::new()),
            refresher: Arc::new(RecordingRefresher::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    fn downloads(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    fn dest(&self) -> PathBuf {
        self.temp_dir.path().join("dest")
    }

    fn config(&self) -> MonitorConfig {
        MonitorConfig {
            category: "movies".to_string(),
            dest_path: self.dest(),
            operation: Operation::Hardlink,
            delete_torrent: true,
            ..Default::default()
        }
    }

    fn monitor(&self, config: MonitorConfig) -> Monitor {
        Monitor::new(config, self.client.clone())
            .with_refresher(self.refresher.clone())
            .with_notifier(self.notifier.clone())
    }

    /// Writes files under the torrent's content path and registers the torrent.
    async fn add_torrent(&self, torrent: Torrent, files: &[(&str, usize)]) -> Torrent {
        let mut listing = Vec::new();
        for (name, size) in files {
            let path = torrent.content_path.join(name);
            tokio::fs::create_dir_all(path.parent().unwrap())
                .await
                .unwrap();
            tokio::fs::write(&path, vec![0xAB; *size]).await.unwrap();
            listing.push(fixtures::file(name, *size as u64));
        }
        self.client.add_torrent(torrent.clone(), listing).await;
        torrent
    }

    async fn add_movie(&self) -> Torrent {
        let torrent = fixtures::completed_torrent("Movie.X264", "movies", self.downloads());
        self.add_torrent(torrent, &[("a.mkv", 1000), ("b.!qB", 500)])
            .await
    }
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(a).unwrap().ino() == std::fs::metadata(b).unwrap().ino()
}

#[cfg(not(unix))]
fn same_inode(_a: &Path, _b: &Path) -> bool {
    true
}

#[tokio::test]
async fn test_movie_with_subfolder() {
    let h = TestHarness::new();
    let torrent = h.add_movie().await;
    let config = MonitorConfig {
        preserve_subfolder: true,
        ..h.config()
    };

    let report = h
        .monitor(config)
        .run_tick(&CancellationToken::new())
        .await
        .unwrap();

    let placed = h.dest().join("Movie.X264").join("a.mkv");
    assert!(placed.exists());
    assert_eq!(std::fs::metadata(&placed).unwrap().len(), 1000);
    assert!(same_inode(&placed, &torrent.content_path.join("a.mkv")));
    assert!(!h.dest().join("Movie.X264").join("b.!qB").exists());

    let t = &report.torrents[0];
    assert_eq!(t.files, 2);
    assert_eq!(t.processed, 1);
    assert_eq!(t.skipped, 1);
    assert_eq!(t.failed, 0);
    assert!(t.all_success);
    assert_eq!(t.deletion, Deletion::Deleted);

    assert_eq!(
        h.client.deleted().await,
        vec![RecordedDelete {
            hash: torrent.hash.clone(),
            delete_files: false,
        }]
    );
    assert_eq!(h.refresher.directories(), vec![h.dest().join("Movie.X264")]);
}

#[tokio::test]
async fn test_movie_flattened() {
    let h = TestHarness::new();
    let torrent = h.add_movie().await;

    let report = h
        .monitor(h.config())
        .run_tick(&CancellationToken::new())
        .await
        .unwrap();

    let placed = h.dest().join("a.mkv");
    assert!(placed.exists());
    assert!(same_inode(&placed, &torrent.content_path.join("a.mkv")));
    assert!(!h.dest().join("Movie.X264").exists());
    assert!(!h.dest().join("b.!qB").exists());

    assert_eq!(report.deleted(), 1);
    assert!(!h.client.has_torrent(&torrent.hash).await);

    let events = h.notifier.events();
    assert!(events.iter().any(|e| matches!(
        e,
        NotificationEvent::TorrentProcessed { files: 1, .. }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, NotificationEvent::TorrentDeleted { .. })));
}

#[tokio::test]
async fn test_only_completed_torrents_in_category_are_processed() {
    let h = TestHarness::new();
    let movie = h.add_movie().await;

    let other_category = fixtures::completed_torrent("Show.S01", "tv", h.downloads());
    h.add_torrent(other_category.clone(), &[("e01.mkv", 10)])
        .await;

    let mut checking = fixtures::completed_torrent("Checking", "movies", h.downloads());
    checking.state = "checkingUP".to_string();
    h.add_torrent(checking.clone(), &[("c.mkv", 10)]).await;

    let mut partial = fixtures::completed_torrent("Partial", "movies", h.downloads());
    partial.progress = 0.99;
    partial.state = "downloading".to_string();
    h.add_torrent(partial.clone(), &[("p.mkv", 10)]).await;

    let report = h
        .monitor(h.config())
        .run_tick(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.torrents_seen, 4);
    assert_eq!(report.completed, 1);
    assert_eq!(h.client.file_requests().await, vec![movie.hash.clone()]);
    assert!(h.client.has_torrent(&other_category.hash).await);
    assert!(h.client.has_torrent(&checking.hash).await);
    assert!(h.client.has_torrent(&partial.hash).await);
}

#[tokio::test]
async fn test_copy_mode_then_second_tick_is_idempotent() {
    let h = TestHarness::new();
    let torrent = h.add_movie().await;
    let config = MonitorConfig {
        operation: Operation::Copy,
        delete_torrent: false,
        ..h.config()
    };
    let monitor = h.monitor(config);

    monitor.run_tick(&CancellationToken::new()).await.unwrap();
    let placed = h.dest().join("a.mkv");
    #[cfg(unix)]
    assert!(!same_inode(&placed, &torrent.content_path.join("a.mkv")));
    let first_mtime = std::fs::metadata(&placed).unwrap().modified().unwrap();

    let report = monitor.run_tick(&CancellationToken::new()).await.unwrap();
    let t = &report.torrents[0];
    assert_eq!(t.processed, 1);
    assert_eq!(t.deletion, Deletion::Disabled);
    assert_eq!(
        std::fs::metadata(&placed).unwrap().modified().unwrap(),
        first_mtime
    );
    assert!(h.client.deleted().await.is_empty());
}

#[tokio::test]
async fn test_delete_files_flag_is_forwarded() {
    let h = TestHarness::new();
    let torrent = h.add_movie().await;
    let config = MonitorConfig {
        delete_files: true,
        ..h.config()
    };

    h.monitor(config)
        .run_tick(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        h.client.deleted().await,
        vec![RecordedDelete {
            hash: torrent.hash,
            delete_files: true,
        }]
    );
}
