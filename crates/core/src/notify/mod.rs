//! Outbound notifications.
//!
//! Notifiers are fire-and-forget: [`Notifier::notify`] returns immediately
//! and delivery happens on a spawned task, so a slow or broken endpoint can
//! never stall a reconciliation tick.

mod event;
mod telegram;
mod webhook;

pub use event::{EventFilter, EventKind, NotificationEvent, WebhookPayload};
pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::Config;

/// Errors from notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("Endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Endpoint accepted the request but reported failure.
    #[error("API error: {0}")]
    Api(String),
}

/// Sink for operator notifications.
pub trait Notifier: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Queues an event for delivery. Never blocks and never fails.
    fn notify(&self, event: NotificationEvent);
}

/// Notifier used when nothing is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn name(&self) -> &str {
        "noop"
    }

    fn notify(&self, _event: NotificationEvent) {}
}

/// Forwards every event to several notifiers.
#[derive(Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    fn notify(&self, event: NotificationEvent) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }
}

/// Builds the notifier set described by the configuration.
///
/// Returns a [`NoopNotifier`] when nothing is enabled.
pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>, NotifyError> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if config.notifications.enabled && !config.notifications.webhook_urls.is_empty() {
        notifiers.push(Arc::new(WebhookNotifier::new(
            &config.notifications,
            &config.transport,
        )?));
    }
    if config.telegram.enabled && !config.telegram.chat_ids.is_empty() {
        notifiers.push(Arc::new(TelegramNotifier::new(
            &config.telegram,
            EventFilter::from(&config.notifications),
            &config.transport,
        )?));
    }

    let names: Vec<&str> = notifiers.iter().map(|n| n.name()).collect();
    info!(notifiers = ?names, "Notifications configured");

    Ok(match notifiers.len() {
        0 => Arc::new(NoopNotifier),
        1 => notifiers.remove(0),
        _ => Arc::new(FanoutNotifier::new(notifiers)),
    })
}

/// Formats a byte count with binary units, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < PREFIXES.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
