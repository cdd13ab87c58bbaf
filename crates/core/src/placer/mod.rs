//! Placer module for materializing torrent files in the destination tree.
//!
//! Each file is hardlinked or copied from the torrent's content root to the
//! destination. A destination that already exists with the expected size is
//! left alone, so repeated passes over the same torrent are cheap.
//!
//! # Features
//!
//! - Hardlinks with a configurable copy fallback across filesystems
//! - Streaming copies that keep permissions and modification time
//! - Byte-count verification of every copy
//! - Dry-run mode that only reports what would happen
//!
//! # Example
//!
//! ```ignore
//! use qbsync_core::placer::FsPlacer;
//!
//! let placer = FsPlacer::with_defaults();
//! let op = placer.place_file(&config.monitor, &torrent, &file).await;
//! if let Some(err) = op.error() {
//!     eprintln!("{}: {}", op.source.display(), err);
//! }
//! ```

mod config;
mod error;
mod fs_placer;
mod traits;
mod types;

pub use config::PlacerConfig;
pub use error::{is_cross_device_error, PlacerError};
pub use fs_placer::{build_dest_path, verify_file_integrity, FsPlacer};
pub use traits::{HardLinker, StdHardLinker};
pub use types::{FileOperation, PlacementAction};
