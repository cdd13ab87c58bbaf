//! Core library for qb-sync.
//!
//! Watches a qBittorrent category for completed torrents and hardlinks or
//! copies their files into a media tree.

pub mod config;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod placer;
pub mod refresh;
pub mod testing;
pub mod torrent_client;
pub mod transport;

pub use config::{
    load_config, load_config_from_str, resolve_config_path, validate_config, Config, ConfigError,
    CrossDeviceFallback, MonitorConfig, Operation, SanitizedConfig,
};
pub use monitor::{Backoff, Monitor, MonitorError, MonitorStatus, TickReport, TorrentReport};
pub use notify::{build_notifier, NotificationEvent, Notifier};
pub use placer::{FileOperation, FsPlacer, PlacementAction, PlacerError};
pub use refresh::{LibraryRefresher, NoopRefresher, PlexRefresher, RefreshError};
pub use torrent_client::{
    filter_completed_torrents, QBittorrentClient, Torrent, TorrentClient, TorrentClientError,
    TorrentFile,
};
