//! JSON webhook notifier.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, warn};

use super::event::{EventFilter, NotificationEvent, WebhookPayload};
use super::{Notifier, NotifyError};
use crate::config::{NotificationConfig, TransportConfig};
use crate::transport::{build_http_client, ClientOptions};

/// Posts each enabled event as JSON to every configured URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    urls: Arc<[String]>,
    filter: EventFilter,
}

impl WebhookNotifier {
    pub fn new(
        config: &NotificationConfig,
        transport: &TransportConfig,
    ) -> Result<Self, NotifyError> {
        let client = build_http_client(transport, ClientOptions::default())?;
        Ok(Self {
            client,
            urls: config.webhook_urls.clone().into(),
            filter: EventFilter::from(config),
        })
    }

    /// Delivers one event to all URLs, stopping at the first failure.
    pub async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        if !self.filter.allows(event.kind()) {
            return Ok(());
        }

        let payload = WebhookPayload::new(event);
        for url in self.urls.iter() {
            let response = self.client.post(url).json(&payload).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(NotifyError::Status {
                    url: url.clone(),
                    status: status.as_u16(),
                });
            }
        }

        debug!(kind = event.kind().as_str(), "Webhook notification sent");
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn notify(&self, event: NotificationEvent) {
        if !self.filter.allows(event.kind()) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.send(&event).await {
                warn!(kind = event.kind().as_str(), error = %e, "Failed to send webhook notification");
            }
        });
    }
}
