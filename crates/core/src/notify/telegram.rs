//! Telegram Bot API notifier (outbound messages only).

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::event::{EventFilter, NotificationEvent};
use super::{Notifier, NotifyError};
use crate::config::{TelegramConfig, TransportConfig};
use crate::transport::{build_http_client, ClientOptions};

const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends each enabled event as a text message to every configured chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    token: String,
    chat_ids: Arc<[i64]>,
    filter: EventFilter,
}

impl TelegramNotifier {
    pub fn new(
        config: &TelegramConfig,
        filter: EventFilter,
        transport: &TransportConfig,
    ) -> Result<Self, NotifyError> {
        let client = build_http_client(transport, ClientOptions::default())?;
        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            token: config.token.clone(),
            chat_ids: config.chat_ids.clone().into(),
            filter,
        })
    }

    /// Points the notifier at another Bot API server.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        if !self.filter.allows(event.kind()) {
            return Ok(());
        }

        // Request errors are stripped of this URL; it carries the token.
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);
        let text = event.render();

        for &chat_id in self.chat_ids.iter() {
            let response = self
                .client
                .post(&url)
                .json(&SendMessage {
                    chat_id,
                    text: &text,
                })
                .send()
                .await
                .map_err(|e| NotifyError::from(e.without_url()))?;

            let status = response.status();
            let body: ApiResponse = match response.json().await {
                Ok(body) => body,
                Err(_) if !status.is_success() => {
                    return Err(NotifyError::Status {
                        url: format!("{}/bot<redacted>/sendMessage", self.api_url),
                        status: status.as_u16(),
                    })
                }
                Err(e) => return Err(e.without_url().into()),
            };
            if !body.ok {
                return Err(NotifyError::Api(
                    body.description
                        .unwrap_or_else(|| format!("sendMessage failed with HTTP {status}")),
                ));
            }
            debug!(chat_id, "Telegram message sent");
        }
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn notify(&self, event: NotificationEvent) {
        if !self.filter.allows(event.kind()) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.send(&event).await {
                warn!(kind = event.kind().as_str(), error = %e, "Failed to send Telegram notification");
            }
        });
    }
}
