//! File system placer implementation.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use super::config::PlacerConfig;
use super::error::{is_cross_device_error, PlacerError};
use super::traits::{HardLinker, StdHardLinker};
use super::types::{FileOperation, PlacementAction};
use crate::config::{CrossDeviceFallback, MonitorConfig, Operation};
use crate::torrent_client::{Torrent, TorrentFile};

/// File system based placer.
///
/// Materializes one torrent file into the destination tree. Never mutates
/// the source, and never overwrites a destination whose size already
/// matches.
pub struct FsPlacer {
    config: PlacerConfig,
    linker: Arc<dyn HardLinker>,
}

impl FsPlacer {
    /// Creates a new file system placer with the given configuration.
    pub fn new(config: PlacerConfig) -> Self {
        Self {
            config,
            linker: Arc::new(StdHardLinker),
        }
    }

    /// Creates a placer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PlacerConfig::default())
    }

    /// Replaces the hardlink primitive.
    pub fn with_linker(mut self, linker: Arc<dyn HardLinker>) -> Self {
        self.linker = linker;
        self
    }

    /// Places a single torrent file according to the monitor settings.
    ///
    /// Errors are carried inside the returned [`FileOperation`] so callers
    /// can keep going with the remaining files.
    pub async fn place_file(
        &self,
        monitor: &MonitorConfig,
        torrent: &Torrent,
        file: &TorrentFile,
    ) -> FileOperation {
        let source = torrent.content_path.join(&file.name);

        if file.is_incomplete() {
            debug!(file = %file.name, "Skipping incomplete file");
            return FileOperation {
                source,
                destination: PathBuf::new(),
                size: file.size,
                result: Ok(PlacementAction::SkippedIncomplete),
            };
        }

        let destination = match build_dest_path(monitor, torrent, file) {
            Ok(path) => path,
            Err(e) => {
                return FileOperation {
                    source,
                    destination: PathBuf::new(),
                    size: file.size,
                    result: Err(e),
                }
            }
        };

        let result = self
            .materialize(monitor, &source, &destination, file.size)
            .await;

        FileOperation {
            source,
            destination,
            size: file.size,
            result,
        }
    }

    async fn materialize(
        &self,
        monitor: &MonitorConfig,
        source: &Path,
        destination: &Path,
        size: u64,
    ) -> Result<PlacementAction, PlacerError> {
        if verify_file_integrity(destination, size).await {
            debug!(destination = %destination.display(), "Destination already present");
            return Ok(PlacementAction::AlreadyPresent);
        }

        if monitor.dry_run {
            if let Err(e) = fs::metadata(source).await {
                return Err(source_error(source, e));
            }
            info!(
                operation = %monitor.operation,
                source = %source.display(),
                destination = %destination.display(),
                "[dry run] Would place file"
            );
            return Ok(PlacementAction::WouldPlace);
        }

        self.ensure_parent_dirs(destination).await?;

        match monitor.operation {
            Operation::Copy => {
                self.copy_file(source, destination, size).await?;
                Ok(PlacementAction::Copied)
            }
            Operation::Hardlink => {
                self.hard_link_file(monitor.cross_device_fallback, source, destination, size)
                    .await
            }
        }
    }

    async fn hard_link_file(
        &self,
        fallback: CrossDeviceFallback,
        source: &Path,
        destination: &Path,
        size: u64,
    ) -> Result<PlacementAction, PlacerError> {
        match self.linker.hard_link(source, destination).await {
            Ok(()) => Ok(PlacementAction::Hardlinked),
            Err(e) if is_cross_device_error(&e) => match fallback {
                CrossDeviceFallback::Copy => {
                    warn!(
                        source = %source.display(),
                        destination = %destination.display(),
                        "Hardlink crosses filesystems, falling back to copy"
                    );
                    self.copy_file(source, destination, size).await?;
                    Ok(PlacementAction::CopiedAfterCrossDevice)
                }
                CrossDeviceFallback::Error => Err(PlacerError::CrossDevice {
                    source_path: source.to_path_buf(),
                    destination: destination.to_path_buf(),
                    error: e,
                }),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PlacerError::SourceNotFound {
                path: source.to_path_buf(),
            }),
            Err(e) => Err(PlacerError::LinkFailed {
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
                error: e,
            }),
        }
    }

    /// Copies a file, preserving permissions and modification time.
    ///
    /// The copied byte count must equal `expected_size`; on mismatch the
    /// partial destination is kept.
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        expected_size: u64,
    ) -> Result<(), PlacerError> {
        let copy_failed =
            |e: io::Error| PlacerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e);

        let source_file = File::open(source)
            .await
            .map_err(|e| source_error(source, e))?;
        let metadata = source_file.metadata().await.map_err(copy_failed)?;

        let dest_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(destination)
            .await
            .map_err(copy_failed)?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);

        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(copy_failed)?;
        writer.flush().await.map_err(copy_failed)?;

        if copied != expected_size {
            return Err(PlacerError::SizeMismatch {
                path: destination.to_path_buf(),
                expected: expected_size,
                actual: copied,
            });
        }

        let dest_file = writer.into_inner();
        dest_file.sync_all().await.map_err(copy_failed)?;

        let std_file = dest_file.into_std().await;
        if let Ok(modified) = metadata.modified() {
            std_file.set_modified(modified).map_err(copy_failed)?;
        }
        std_file
            .set_permissions(metadata.permissions())
            .map_err(copy_failed)?;

        debug!(
            source = %source.display(),
            destination = %destination.display(),
            bytes = copied,
            "File copied"
        );
        Ok(())
    }

    /// Creates parent directories for a path.
    async fn ensure_parent_dirs(&self, path: &Path) -> Result<(), PlacerError> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if fs::try_exists(parent).await.unwrap_or(false) {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.config.directory_mode);

        builder
            .create(parent)
            .await
            .map_err(|e| PlacerError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                error: e,
            })
    }
}

impl Default for FsPlacer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn source_error(source: &Path, e: io::Error) -> PlacerError {
    if e.kind() == io::ErrorKind::NotFound {
        PlacerError::SourceNotFound {
            path: source.to_path_buf(),
        }
    } else {
        PlacerError::Io(e)
    }
}

/// Computes where a torrent file lands under the destination root.
///
/// `dest_path/[torrent.name/]file.name`. Names that are absolute or climb
/// out of the root are rejected.
pub fn build_dest_path(
    monitor: &MonitorConfig,
    torrent: &Torrent,
    file: &TorrentFile,
) -> Result<PathBuf, PlacerError> {
    let mut destination = monitor.dest_path.clone();
    if monitor.preserve_subfolder {
        check_relative(&torrent.name)?;
        destination.push(&torrent.name);
    }
    check_relative(&file.name)?;
    destination.push(&file.name);
    Ok(destination)
}

fn check_relative(name: &str) -> Result<(), PlacerError> {
    let invalid = |reason| PlacerError::InvalidPath {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("parent directory component")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("absolute path")),
        }
    }
    Ok(())
}

/// Whether `path` is a regular file of exactly `expected_size` bytes.
pub async fn verify_file_integrity(path: &Path, expected_size: u64) -> bool {
    match fs::metadata(path).await {
        Ok(metadata) => metadata.is_file() && metadata.len() == expected_size,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CrossDeviceLinker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HardLinker for CrossDeviceLinker {
        async fn hard_link(&self, _source: &Path, _destination: &Path) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::from_raw_os_error(18))
        }
    }

    struct DeniedLinker;

    #[async_trait]
    impl HardLinker for DeniedLinker {
        async fn hard_link(&self, _source: &Path, _destination: &Path) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        }
    }

    struct Fixture {
        _temp: TempDir,
        monitor: MonitorConfig,
        torrent: Torrent,
    }

    async fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let content = temp.path().join("downloads/Movie.X264");
        fs::create_dir_all(&content).await.unwrap();

        let monitor = MonitorConfig {
            category: "movies".to_string(),
            dest_path: temp.path().join("media"),
            ..Default::default()
        };
        let torrent = Torrent {
            hash: "abcdef0123456789".to_string(),
            name: "Movie.X264".to_string(),
            category: "movies".to_string(),
            state: "uploading".to_string(),
            progress: 1.0,
            save_path: temp.path().join("downloads"),
            content_path: content,
            size: 1000,
            completed: 1000,
            completed_at: None,
        };

        Fixture {
            _temp: temp,
            monitor,
            torrent,
        }
    }

    fn file(name: &str, size: u64) -> TorrentFile {
        TorrentFile {
            name: name.to_string(),
            size,
            progress: 1.0,
            priority: 1,
            is_seed: true,
        }
    }

    async fn write_source(torrent: &Torrent, name: &str, size: usize) -> PathBuf {
        let path = torrent.content_path.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(&path, vec![7u8; size]).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_hardlink_file() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 1000).await;

        let placer = FsPlacer::with_defaults();
        let op = placer
            .place_file(&fx.monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;

        assert_eq!(op.action(), Some(PlacementAction::Hardlinked));
        assert_eq!(op.destination, fx.monitor.dest_path.join("a.mkv"));
        assert!(verify_file_integrity(&op.destination, 1000).await);
        assert!(op.source.exists());
    }

    #[tokio::test]
    async fn test_place_is_idempotent() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 1000).await;

        let placer = FsPlacer::with_defaults();
        let first = placer
            .place_file(&fx.monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;
        assert_eq!(first.action(), Some(PlacementAction::Hardlinked));

        let second = placer
            .place_file(&fx.monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;
        assert_eq!(second.action(), Some(PlacementAction::AlreadyPresent));
    }

    #[tokio::test]
    async fn test_existing_destination_is_not_overwritten() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 4).await;

        let destination = fx.monitor.dest_path.join("a.mkv");
        fs::create_dir_all(&fx.monitor.dest_path).await.unwrap();
        fs::write(&destination, b"keep").await.unwrap();

        let monitor = MonitorConfig {
            operation: Operation::Copy,
            ..fx.monitor.clone()
        };
        let op = FsPlacer::with_defaults()
            .place_file(&monitor, &fx.torrent, &file("a.mkv", 4))
            .await;

        assert_eq!(op.action(), Some(PlacementAction::AlreadyPresent));
        assert_eq!(fs::read(&destination).await.unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_copy_preserves_mtime_and_permissions() {
        let fx = fixture().await;
        let source = write_source(&fx.torrent, "a.mkv", 1000).await;

        let mtime = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000);
        let std_file = std::fs::OpenOptions::new().write(true).open(&source).unwrap();
        std_file.set_modified(mtime).unwrap();
        drop(std_file);

        let monitor = MonitorConfig {
            operation: Operation::Copy,
            ..fx.monitor.clone()
        };
        let op = FsPlacer::with_defaults()
            .place_file(&monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;

        assert_eq!(op.action(), Some(PlacementAction::Copied));
        let src_meta = fs::metadata(&source).await.unwrap();
        let dst_meta = fs::metadata(&op.destination).await.unwrap();
        assert_eq!(dst_meta.len(), 1000);
        assert_eq!(dst_meta.modified().unwrap(), mtime);
        assert_eq!(dst_meta.permissions(), src_meta.permissions());
    }

    #[tokio::test]
    async fn test_cross_device_falls_back_to_copy() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 1000).await;

        let linker = Arc::new(CrossDeviceLinker {
            calls: AtomicUsize::new(0),
        });
        let placer = FsPlacer::with_defaults().with_linker(linker.clone());
        let op = placer
            .place_file(&fx.monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;

        assert_eq!(op.action(), Some(PlacementAction::CopiedAfterCrossDevice));
        assert_eq!(linker.calls.load(Ordering::SeqCst), 1);
        assert!(verify_file_integrity(&op.destination, 1000).await);
    }

    #[tokio::test]
    async fn test_cross_device_error_policy_creates_nothing() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 1000).await;

        let monitor = MonitorConfig {
            cross_device_fallback: CrossDeviceFallback::Error,
            ..fx.monitor.clone()
        };
        let placer = FsPlacer::with_defaults().with_linker(Arc::new(CrossDeviceLinker {
            calls: AtomicUsize::new(0),
        }));
        let op = placer
            .place_file(&monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;

        assert!(op.error().unwrap().is_cross_device());
        assert!(!op.destination.exists());
    }

    #[tokio::test]
    async fn test_other_link_errors_do_not_fall_back() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 1000).await;

        let placer = FsPlacer::with_defaults().with_linker(Arc::new(DeniedLinker));
        let op = placer
            .place_file(&fx.monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;

        assert!(matches!(op.error(), Some(PlacerError::LinkFailed { .. })));
        assert!(!op.destination.exists());
    }

    #[tokio::test]
    async fn test_preserve_subfolder() {
        let fx = fixture().await;
        write_source(&fx.torrent, "Subs/en.srt", 10).await;

        let monitor = MonitorConfig {
            preserve_subfolder: true,
            ..fx.monitor.clone()
        };
        let op = FsPlacer::with_defaults()
            .place_file(&monitor, &fx.torrent, &file("Subs/en.srt", 10))
            .await;

        assert!(op.success());
        assert_eq!(
            op.destination,
            fx.monitor.dest_path.join("Movie.X264").join("Subs/en.srt")
        );
        assert!(op.destination.exists());
    }

    #[tokio::test]
    async fn test_copy_size_mismatch_keeps_destination() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 999).await;

        let monitor = MonitorConfig {
            operation: Operation::Copy,
            ..fx.monitor.clone()
        };
        let op = FsPlacer::with_defaults()
            .place_file(&monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;

        match op.error() {
            Some(PlacerError::SizeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(*expected, 1000);
                assert_eq!(*actual, 999);
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }
        assert!(op.destination.exists());
    }

    #[tokio::test]
    async fn test_incomplete_file_is_skipped() {
        let fx = fixture().await;
        write_source(&fx.torrent, "b.!qB", 500).await;

        let op = FsPlacer::with_defaults()
            .place_file(&fx.monitor, &fx.torrent, &file("b.!qB", 500))
            .await;

        assert!(op.is_skipped());
        assert!(!fx.monitor.dest_path.exists());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let fx = fixture().await;
        write_source(&fx.torrent, "a.mkv", 1000).await;

        let monitor = MonitorConfig {
            dry_run: true,
            ..fx.monitor.clone()
        };
        let op = FsPlacer::with_defaults()
            .place_file(&monitor, &fx.torrent, &file("a.mkv", 1000))
            .await;

        assert_eq!(op.action(), Some(PlacementAction::WouldPlace));
        assert!(!fx.monitor.dest_path.exists());
    }

    #[tokio::test]
    async fn test_dry_run_reports_missing_source() {
        let fx = fixture().await;

        let monitor = MonitorConfig {
            dry_run: true,
            ..fx.monitor.clone()
        };
        let op = FsPlacer::with_defaults()
            .place_file(&monitor, &fx.torrent, &file("missing.mkv", 1000))
            .await;

        assert!(matches!(op.error(), Some(PlacerError::SourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_source() {
        let fx = fixture().await;

        let op = FsPlacer::with_defaults()
            .place_file(&fx.monitor, &fx.torrent, &file("missing.mkv", 1000))
            .await;

        assert!(matches!(op.error(), Some(PlacerError::SourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let fx = fixture().await;
        let placer = FsPlacer::with_defaults();

        for name in ["../escape.mkv", "/etc/passwd", "a/../../b", ""] {
            let op = placer
                .place_file(&fx.monitor, &fx.torrent, &file(name, 1))
                .await;
            assert!(
                matches!(op.error(), Some(PlacerError::InvalidPath { .. })),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_build_dest_path() {
        let monitor = MonitorConfig {
            dest_path: PathBuf::from("/media/movies"),
            ..Default::default()
        };
        let torrent = Torrent {
            hash: "abc".to_string(),
            name: "Movie.X264".to_string(),
            category: "movies".to_string(),
            state: "uploading".to_string(),
            progress: 1.0,
            save_path: PathBuf::from("/downloads"),
            content_path: PathBuf::from("/downloads/Movie.X264"),
            size: 0,
            completed: 0,
            completed_at: None,
        };

        let flat = build_dest_path(&monitor, &torrent, &file("a.mkv", 1)).unwrap();
        assert_eq!(flat, PathBuf::from("/media/movies/a.mkv"));

        let nested = MonitorConfig {
            preserve_subfolder: true,
            ..monitor
        };
        let path = build_dest_path(&nested, &torrent, &file("a.mkv", 1)).unwrap();
        assert_eq!(path, PathBuf::from("/media/movies/Movie.X264/a.mkv"));
    }
}
