//! Notification events and their rendering.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::format_bytes;
use crate::config::{NotificationConfig, Operation};

/// Event classes that can be switched on or off independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Success,
    Error,
    RefreshError,
    TorrentDelete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Success => "success",
            EventKind::Error => "error",
            EventKind::RefreshError => "refresh_error",
            EventKind::TorrentDelete => "torrent_delete",
        }
    }
}

/// Which event kinds a notifier forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    pub on_success: bool,
    pub on_error: bool,
    pub on_refresh_error: bool,
    pub on_torrent_delete: bool,
}

impl EventFilter {
    pub fn all() -> Self {
        Self {
            on_success: true,
            on_error: true,
            on_refresh_error: true,
            on_torrent_delete: true,
        }
    }

    pub fn allows(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Success => self.on_success,
            EventKind::Error => self.on_error,
            EventKind::RefreshError => self.on_refresh_error,
            EventKind::TorrentDelete => self.on_torrent_delete,
        }
    }
}

impl From<&NotificationConfig> for EventFilter {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            on_success: config.on_success,
            on_error: config.on_error,
            on_refresh_error: config.on_refresh_error,
            on_torrent_delete: config.on_torrent_delete,
        }
    }
}

/// Something worth telling an operator about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    TorrentProcessed {
        torrent: String,
        category: String,
        operation: Operation,
        files: usize,
        size: u64,
    },
    TorrentFailed {
        torrent: String,
        category: String,
        error: String,
    },
    FileFailed {
        torrent: String,
        category: String,
        file: String,
        error: String,
    },
    RefreshFailed {
        torrent: String,
        category: String,
        directory: String,
        error: String,
    },
    TorrentDeleted {
        torrent: String,
        category: String,
        delete_files: bool,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NotificationEvent::TorrentProcessed { .. } => EventKind::Success,
            NotificationEvent::TorrentFailed { .. } | NotificationEvent::FileFailed { .. } => {
                EventKind::Error
            }
            NotificationEvent::RefreshFailed { .. } => EventKind::RefreshError,
            NotificationEvent::TorrentDeleted { .. } => EventKind::TorrentDelete,
        }
    }

    pub fn torrent(&self) -> &str {
        match self {
            NotificationEvent::TorrentProcessed { torrent, .. }
            | NotificationEvent::TorrentFailed { torrent, .. }
            | NotificationEvent::FileFailed { torrent, .. }
            | NotificationEvent::RefreshFailed { torrent, .. }
            | NotificationEvent::TorrentDeleted { torrent, .. } => torrent,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationEvent::TorrentProcessed { .. } => "✅ Torrent Processed Successfully",
            NotificationEvent::TorrentFailed { .. } => "❌ Torrent Processing Failed",
            NotificationEvent::FileFailed { .. } => "❌ File Operation Failed",
            NotificationEvent::RefreshFailed { .. } => "⚠️ Library Refresh Failed",
            NotificationEvent::TorrentDeleted { .. } => "🗑️ Torrent Deleted",
        }
    }

    /// Multi-line body without the title.
    pub fn message(&self) -> String {
        match self {
            NotificationEvent::TorrentProcessed {
                torrent,
                category,
                operation,
                files,
                size,
            } => format!(
                "Torrent: {torrent}\nOperation: {operation}\nFiles processed: {files}\nSize: {}\nCategory: {category}",
                format_bytes(*size)
            ),
            NotificationEvent::TorrentFailed {
                torrent,
                category,
                error,
            } => format!("Torrent: {torrent}\nError: {error}\nCategory: {category}"),
            NotificationEvent::FileFailed {
                torrent,
                category,
                file,
                error,
            } => format!("Torrent: {torrent}\nFile: {file}\nError: {error}\nCategory: {category}"),
            NotificationEvent::RefreshFailed {
                torrent,
                category,
                directory,
                error,
            } => format!(
                "Torrent: {torrent}\nDirectory: {directory}\nError: {error}\nCategory: {category}"
            ),
            NotificationEvent::TorrentDeleted {
                torrent,
                category,
                delete_files,
            } => format!("Torrent: {torrent}\nFiles deleted: {delete_files}\nCategory: {category}"),
        }
    }

    /// Title and body as a single text message.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.title(), self.message())
    }
}

/// JSON body posted to webhooks.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub kind: EventKind,
    pub title: &'static str,
    pub message: String,
    pub event: &'a NotificationEvent,
    pub timestamp: DateTime<Utc>,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(event: &'a NotificationEvent) -> Self {
        Self {
            kind: event.kind(),
            title: event.title(),
            message: event.message(),
            event,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed() -> NotificationEvent {
        NotificationEvent::TorrentProcessed {
            torrent: "Movie.X264".to_string(),
            category: "movies".to_string(),
            operation: Operation::Hardlink,
            files: 1,
            size: 1536,
        }
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(processed().kind(), EventKind::Success);
        let failed = NotificationEvent::FileFailed {
            torrent: "t".to_string(),
            category: "c".to_string(),
            file: "f".to_string(),
            error: "e".to_string(),
        };
        assert_eq!(failed.kind(), EventKind::Error);
        let deleted = NotificationEvent::TorrentDeleted {
            torrent: "t".to_string(),
            category: "c".to_string(),
            delete_files: false,
        };
        assert_eq!(deleted.kind(), EventKind::TorrentDelete);
    }

    #[test]
    fn test_render_processed() {
        let text = processed().render();
        assert!(text.starts_with("✅ Torrent Processed Successfully\n\n"));
        assert!(text.contains("Torrent: Movie.X264"));
        assert!(text.contains("Operation: hardlink"));
        assert!(text.contains("Size: 1.5 KB"));
    }

    #[test]
    fn test_filter_from_config() {
        let config = NotificationConfig::default();
        let filter = EventFilter::from(&config);
        assert!(filter.allows(EventKind::Success));
        assert!(filter.allows(EventKind::Error));
        assert!(filter.allows(EventKind::RefreshError));
        assert!(!filter.allows(EventKind::TorrentDelete));
    }

    #[test]
    fn test_payload_serialization() {
        let event = processed();
        let payload = WebhookPayload::new(&event);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "success");
        assert_eq!(value["event"]["type"], "torrent_processed");
        assert_eq!(value["event"]["torrent"], "Movie.X264");
        assert_eq!(value["event"]["operation"], "hardlink");
    }
}
