//! Collaborators that record what they were asked to do.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::notify::{NotificationEvent, Notifier};
use crate::refresh::{LibraryRefresher, RefreshError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Refresher that records every directory and optionally fails.
#[derive(Debug, Default)]
pub struct RecordingRefresher {
    directories: Mutex<Vec<PathBuf>>,
    fail: Mutex<bool>,
    interrupt: Mutex<bool>,
}

impl RecordingRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every refresh fail.
    pub fn set_failing(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    /// Make every refresh report cancellation, as when shutdown lands mid-request.
    pub fn set_interrupted(&self, interrupt: bool) {
        *lock(&self.interrupt) = interrupt;
    }

    /// Directories refreshed so far, in call order.
    pub fn directories(&self) -> Vec<PathBuf> {
        lock(&self.directories).clone()
    }
}

#[async_trait]
impl LibraryRefresher for RecordingRefresher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn refresh_directory(
        &self,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RefreshError> {
        if cancel.is_cancelled() {
            return Err(RefreshError::Cancelled);
        }
        lock(&self.directories).push(directory.to_path_buf());
        if *lock(&self.interrupt) {
            return Err(RefreshError::Cancelled);
        }
        if *lock(&self.fail) {
            return Err(RefreshError::Status(503));
        }
        Ok(())
    }
}

/// Notifier that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in order.
    pub fn events(&self) -> Vec<NotificationEvent> {
        lock(&self.events).clone()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify(&self, event: NotificationEvent) {
        lock(&self.events).push(event);
    }
}
