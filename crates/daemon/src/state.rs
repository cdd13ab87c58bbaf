use qbsync_core::{MonitorStatus, SanitizedConfig};
use tokio::sync::watch;

/// Shared application state
pub struct AppState {
    status: watch::Receiver<MonitorStatus>,
    config: SanitizedConfig,
}

impl AppState {
    pub fn new(status: watch::Receiver<MonitorStatus>, config: SanitizedConfig) -> Self {
        Self { status, config }
    }

    /// Latest status published by the monitor loop.
    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    pub fn sanitized_config(&self) -> &SanitizedConfig {
        &self.config
    }
}
