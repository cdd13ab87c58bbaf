//! Error types for the placer module.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Raw errno for EXDEV on Linux and macOS.
const EXDEV: i32 = 18;

/// Errors that can occur during file placement.
#[derive(Debug, Error)]
pub enum PlacerError {
    /// File name would escape the destination root.
    #[error("Invalid file path {name:?}: {reason}")]
    InvalidPath { name: String, reason: &'static str },

    /// Source file not found.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Failed to create destination directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    /// Hardlink crossed filesystems and the fallback policy forbids copying.
    #[error("Cross-device hardlink not allowed from {source_path} to {destination}")]
    CrossDevice {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        error: io::Error,
    },

    /// Failed to create the hardlink.
    #[error("Failed to hardlink {source_path} to {destination}")]
    LinkFailed {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        error: io::Error,
    },

    /// Failed to copy file.
    #[error("Failed to copy file from {source_path} to {destination}")]
    CopyFailed {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        error: io::Error,
    },

    /// Copied byte count disagrees with the size the client reported.
    /// The destination is left in place.
    #[error("Size mismatch for {path}: expected {expected} bytes, copied {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PlacerError {
    /// Creates a copy failed error.
    pub fn copy_failed(source_path: PathBuf, destination: PathBuf, error: io::Error) -> Self {
        Self::CopyFailed {
            source_path,
            destination,
            error,
        }
    }

    /// Whether this is the refused cross-device case.
    pub fn is_cross_device(&self) -> bool {
        matches!(self, Self::CrossDevice { .. })
    }
}

/// Whether an I/O error is a cross-device link failure.
pub fn is_cross_device_error(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::CrossesDevices || error.raw_os_error() == Some(EXDEV)
}
