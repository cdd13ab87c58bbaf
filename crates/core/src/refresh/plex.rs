//! Plex Media Server library refresh.
//!
//! Sections are listed on every refresh so that library changes on the
//! server are picked up without restarting.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{LibraryRefresher, RefreshError};
use crate::config::{PlexConfig, TransportConfig};
use crate::transport::{build_http_client, ClientOptions};

const DEFAULT_PLEX_PORT: u16 = 32400;
const TOKEN_HEADER: &str = "X-Plex-Token";

#[derive(Debug, Deserialize)]
struct SectionsResponse {
    #[serde(rename = "MediaContainer")]
    media_container: MediaContainer,
}

#[derive(Debug, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<LibrarySection>,
}

/// A Plex library section and the folders it covers.
#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySection {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "Location", default)]
    pub locations: Vec<SectionLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionLocation {
    pub path: PathBuf,
}

impl LibrarySection {
    fn contains(&self, path: &Path) -> bool {
        self.locations.iter().any(|l| path.starts_with(&l.path))
    }
}

/// Plex refresher.
pub struct PlexRefresher {
    client: Client,
    base_url: Url,
    token: String,
}

impl PlexRefresher {
    /// Create a new Plex refresher. A URL without an explicit port gets 32400.
    pub fn new(config: &PlexConfig, transport: &TransportConfig) -> Result<Self, RefreshError> {
        let mut base_url =
            Url::parse(&config.url).map_err(|e| RefreshError::InvalidUrl(e.to_string()))?;
        if base_url.port().is_none() {
            base_url
                .set_port(Some(DEFAULT_PLEX_PORT))
                .map_err(|_| RefreshError::InvalidUrl(config.url.clone()))?;
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = build_http_client(
            transport,
            ClientOptions {
                default_headers: headers,
                ..Default::default()
            },
        )?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, RefreshError> {
        self.base_url
            .join(path)
            .map_err(|e| RefreshError::InvalidUrl(e.to_string()))
    }

    /// Lists the server's library sections.
    pub async fn sections(&self) -> Result<Vec<LibrarySection>, RefreshError> {
        let url = self.endpoint("/library/sections")?;
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }

        let body: SectionsResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::ParseError(e.to_string()))?;
        Ok(body.media_container.directories)
    }

    /// Finds the section whose location contains `path`.
    pub async fn find_section(&self, path: &Path) -> Result<LibrarySection, RefreshError> {
        self.sections()
            .await?
            .into_iter()
            .find(|s| s.contains(path))
            .ok_or_else(|| RefreshError::NoLibrary(path.display().to_string()))
    }

    async fn refresh(&self, directory: &Path) -> Result<(), RefreshError> {
        let section = self.find_section(directory).await?;
        debug!(section = %section.title, key = %section.key, "Found library section");

        let mut url = self.endpoint(&format!("/library/sections/{}/refresh", section.key))?;
        url.query_pairs_mut()
            .append_pair("path", &directory.to_string_lossy());

        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }

        info!(
            section = %section.title,
            directory = %directory.display(),
            "Requested library refresh"
        );
        Ok(())
    }
}

#[async_trait]
impl LibraryRefresher for PlexRefresher {
    fn name(&self) -> &str {
        "plex"
    }

    async fn refresh_directory(
        &self,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RefreshError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RefreshError::Cancelled),
            result = self.refresh(directory) => result,
        }
    }
}
