//! qBittorrent WebUI client implementation.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{QBittorrentConfig, TransportConfig};
use crate::transport::{build_http_client, ClientOptions};

use super::{Torrent, TorrentClient, TorrentClientError, TorrentFile};

/// Body qBittorrent returns on a successful login.
const LOGIN_OK: &str = "Ok.";

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    /// Whether the cookie jar holds a live session.
    authenticated: AtomicBool,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(
        config: &QBittorrentConfig,
        transport: &TransportConfig,
    ) -> Result<Self, TorrentClientError> {
        let base_url = config.url.trim_end_matches('/').to_string();

        // The WebUI CSRF check compares these against its own address.
        let origin = HeaderValue::from_str(&base_url)
            .map_err(|e| TorrentClientError::Internal(format!("invalid base URL: {}", e)))?;
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, origin.clone());
        headers.insert(ORIGIN, origin);

        let client = build_http_client(
            transport,
            ClientOptions {
                cookie_store: true,
                default_headers: headers,
            },
        )
        .map_err(|e| TorrentClientError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            authenticated: AtomicBool::new(false),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Whether a session is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Send a request and read the body, racing the cancellation token.
    async fn execute(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<(StatusCode, String), TorrentClientError> {
        with_cancel(cancel, async move {
            let response = request.send().await.map_err(map_request_error)?;
            let status = response.status();
            let body = response.text().await.map_err(map_request_error)?;
            Ok((status, body))
        })
        .await
    }

    /// Log in if no session is held.
    async fn ensure_authenticated(&self, cancel: &CancellationToken) -> Result<(), TorrentClientError> {
        if self.is_authenticated() {
            return Ok(());
        }
        self.login(cancel).await
    }

    /// Map a data-endpoint response to its body.
    ///
    /// A 403 means the session cookie is no longer accepted; the session is
    /// dropped so the next call logs in again, but this call is not retried.
    fn check_response(&self, status: StatusCode, body: String) -> Result<String, TorrentClientError> {
        if status == StatusCode::FORBIDDEN {
            warn!("qBittorrent rejected the session, will re-authenticate on next call");
            self.authenticated.store(false, Ordering::Release);
            return Err(TorrentClientError::AuthenticationFailed(
                "session expired".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(TorrentClientError::HttpStatus(status.as_u16()));
        }
        Ok(body)
    }

    /// Make an authenticated GET request.
    async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated(cancel).await?;

        let request = self.client.get(self.url(endpoint)).query(query);
        let (status, body) = self.execute(request, cancel).await?;
        self.check_response(status, body)
    }

    /// Make an authenticated POST request with form data.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated(cancel).await?;

        let request = self.client.post(self.url(endpoint)).form(params);
        let (status, body) = self.execute(request, cancel).await?;
        self.check_response(status, body)
    }
}

/// Run `fut` unless `cancel` fires first.
async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, TorrentClientError>>,
) -> Result<T, TorrentClientError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TorrentClientError::Cancelled),
        result = fut => result,
    }
}

fn map_request_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_decode() {
        TorrentClientError::Protocol(e.to_string())
    } else {
        TorrentClientError::ConnectionFailed(e.to_string())
    }
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    completed: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent(self) -> Torrent {
        Torrent {
            hash: self.hash.to_lowercase(),
            name: self.name,
            category: self.category,
            state: self.state,
            progress: self.progress,
            save_path: PathBuf::from(self.save_path),
            content_path: PathBuf::from(self.content_path),
            size: self.size.max(0) as u64,
            completed: self.completed.max(0) as u64,
            completed_at: timestamp_to_datetime(self.completion_on),
        }
    }
}

/// qBittorrent per-file response.
#[derive(Debug, Deserialize)]
struct QBTorrentFile {
    name: String,
    size: i64,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    is_seed: bool,
}

impl QBTorrentFile {
    fn into_torrent_file(self) -> TorrentFile {
        TorrentFile {
            name: self.name,
            size: self.size.max(0) as u64,
            progress: self.progress,
            priority: self.priority,
            is_seed: self.is_seed,
        }
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

fn parse_torrents(body: &str) -> Result<Vec<Torrent>, TorrentClientError> {
    let torrents: Vec<QBTorrentInfo> = serde_json::from_str(body)
        .map_err(|e| TorrentClientError::Protocol(format!("failed to decode torrent list: {}", e)))?;
    Ok(torrents.into_iter().map(QBTorrentInfo::into_torrent).collect())
}

fn parse_files(body: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
    let files: Vec<QBTorrentFile> = serde_json::from_str(body)
        .map_err(|e| TorrentClientError::Protocol(format!("failed to decode file list: {}", e)))?;
    Ok(files.into_iter().map(QBTorrentFile::into_torrent_file).collect())
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn login(&self, cancel: &CancellationToken) -> Result<(), TorrentClientError> {
        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let request = self.client.post(self.url("/api/v2/auth/login")).form(&params);
        let (status, body) = self.execute(request, cancel).await?;

        if status == StatusCode::OK && body == LOGIN_OK {
            debug!("qBittorrent login successful");
            // Session cookie is stored by the cookie jar
            self.authenticated.store(true, Ordering::Release);
            return Ok(());
        }

        self.authenticated.store(false, Ordering::Release);
        if status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "IP banned after too many failed attempts".to_string(),
            ))
        } else if status != StatusCode::OK {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "login failed with status {}",
                status
            )))
        } else if body.contains("Fails.") {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn list_all_torrents(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Torrent>, TorrentClientError> {
        let body = self.get("/api/v2/torrents/info", &[], cancel).await?;
        parse_torrents(&body)
    }

    async fn files_by_hash(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<TorrentFile>, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let body = self
            .get("/api/v2/torrents/files", &[("hash", &hash_lower)], cancel)
            .await
            .map_err(|e| match e {
                TorrentClientError::HttpStatus(404) => {
                    TorrentClientError::TorrentNotFound(hash.to_string())
                }
                other => other,
            })?;
        parse_files(&body)
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
        cancel: &CancellationToken,
    ) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };

        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", &hash_lower), ("deleteFiles", delete_str)],
            cancel,
        )
        .await?;

        Ok(())
    }
}
