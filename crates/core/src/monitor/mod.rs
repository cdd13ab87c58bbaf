//! Torrent monitor: the poll-process-reconcile loop.
//!
//! After logging in, the monitor ticks on a fixed interval. Each tick lists
//! all torrents, keeps the completed ones in the configured category, and
//! for each of them:
//! - places every file into the destination tree
//! - asks the library refresher to rescan the touched directories
//! - deletes the torrent from the client when every file succeeded
//!
//! Ticks run strictly one after another on a single task.

mod backoff;
mod runner;
mod types;

pub use backoff::{Backoff, INITIAL_BACKOFF, MAX_BACKOFF};
pub use runner::Monitor;
pub use types::{Deletion, MonitorError, MonitorStatus, TickReport, TorrentReport};
