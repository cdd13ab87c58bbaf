//! Media library refresh after files land in the destination tree.
//!
//! The monitor calls a [`LibraryRefresher`] once per distinct destination
//! directory it touched during a tick. Failures are reported, never fatal.

mod plex;

pub use plex::PlexRefresher;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while asking a media server to rescan.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("Media server returned HTTP {0}")]
    Status(u16),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// No library section contains the path.
    #[error("No library found for path: {0}")]
    NoLibrary(String),

    /// Invalid server URL.
    #[error("Invalid media server URL: {0}")]
    InvalidUrl(String),

    #[error("Refresh cancelled")]
    Cancelled,
}

/// Rescans a directory in a media library.
#[async_trait]
pub trait LibraryRefresher: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether refreshes actually go anywhere.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Triggers a scoped rescan of `directory`.
    async fn refresh_directory(
        &self,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RefreshError>;
}

/// Refresher used when no media server is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRefresher;

#[async_trait]
impl LibraryRefresher for NoopRefresher {
    fn name(&self) -> &str {
        "noop"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn refresh_directory(
        &self,
        _directory: &Path,
        _cancel: &CancellationToken,
    ) -> Result<(), RefreshError> {
        Ok(())
    }
}
