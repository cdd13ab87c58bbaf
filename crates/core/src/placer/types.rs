//! Types for the placer module.

use serde::Serialize;
use std::path::PathBuf;

use super::error::PlacerError;

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementAction {
    /// Destination hardlinked to the source.
    Hardlinked,
    /// Destination copied from the source.
    Copied,
    /// Hardlink crossed filesystems and the copy fallback ran.
    CopiedAfterCrossDevice,
    /// Destination already present with the expected size.
    AlreadyPresent,
    /// Dry run: the file would have been placed.
    WouldPlace,
    /// File still carries the incomplete marker and was not placed.
    SkippedIncomplete,
}

impl PlacementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementAction::Hardlinked => "hardlinked",
            PlacementAction::Copied => "copied",
            PlacementAction::CopiedAfterCrossDevice => "copied_after_cross_device",
            PlacementAction::AlreadyPresent => "already_present",
            PlacementAction::WouldPlace => "would_place",
            PlacementAction::SkippedIncomplete => "skipped_incomplete",
        }
    }

    /// Whether the destination tree was modified.
    pub fn touched_destination(&self) -> bool {
        matches!(
            self,
            PlacementAction::Hardlinked
                | PlacementAction::Copied
                | PlacementAction::CopiedAfterCrossDevice
        )
    }
}

/// Outcome of placing one file. Lives for a single processing pass.
#[derive(Debug)]
pub struct FileOperation {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Size in bytes reported by the client.
    pub size: u64,
    pub result: Result<PlacementAction, PlacerError>,
}

impl FileOperation {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn action(&self) -> Option<PlacementAction> {
        self.result.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&PlacerError> {
        self.result.as_ref().err()
    }

    /// Skipped files count neither as processed nor as failed.
    pub fn is_skipped(&self) -> bool {
        self.action() == Some(PlacementAction::SkippedIncomplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(result: Result<PlacementAction, PlacerError>) -> FileOperation {
        FileOperation {
            source: PathBuf::from("/downloads/a.mkv"),
            destination: PathBuf::from("/media/a.mkv"),
            size: 1000,
            result,
        }
    }

    #[test]
    fn test_successful_operation() {
        let op = op(Ok(PlacementAction::Hardlinked));
        assert!(op.success());
        assert!(op.error().is_none());
        assert!(!op.is_skipped());
        assert_eq!(op.action(), Some(PlacementAction::Hardlinked));
    }

    #[test]
    fn test_failed_operation() {
        let op = op(Err(PlacerError::SourceNotFound {
            path: PathBuf::from("/downloads/a.mkv"),
        }));
        assert!(!op.success());
        assert!(op.error().is_some());
        assert!(op.action().is_none());
    }

    #[test]
    fn test_skipped_operation() {
        let op = op(Ok(PlacementAction::SkippedIncomplete));
        assert!(op.is_skipped());
        assert!(!PlacementAction::SkippedIncomplete.touched_destination());
    }

    #[test]
    fn test_touched_destination() {
        assert!(PlacementAction::Hardlinked.touched_destination());
        assert!(PlacementAction::Copied.touched_destination());
        assert!(PlacementAction::CopiedAfterCrossDevice.touched_destination());
        assert!(!PlacementAction::AlreadyPresent.touched_destination());
        assert!(!PlacementAction::WouldPlace.touched_destination());
    }
}
