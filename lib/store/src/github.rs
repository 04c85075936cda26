//! GitHub contents API implementation of [`RecordStore`].
//!
//! Reads fetch the raw file. Writes fetch the blob `sha` first and send it
//! back with the new content, so GitHub refuses the commit if someone else
//! changed the file in between.

use crate::error::StoreError;
use crate::store::{RecordStore, StoreStatus, parse_document};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use roster_core::Record;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Media type returning the file body itself.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.v3.raw";

/// Media type returning file metadata as JSON.
const JSON_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// GitHub rejects requests without a user agent.
const USER_AGENT: &str = concat!("roster-bot/", env!("CARGO_PKG_VERSION"));

const READ_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest response body excerpt kept in errors.
const BODY_EXCERPT: usize = 500;

/// Configuration for the GitHub-hosted record document.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Access token with contents write permission on the repository.
    token: String,
    /// Repository owner (user or organisation).
    owner: String,
    /// Repository name.
    repo: String,
    /// Path of the JSON document inside the repository.
    path: String,
    /// Branch the document is read from and committed to.
    /// Default: "main"
    #[serde(default = "default_branch")]
    branch: String,
    /// Base URL of the GitHub REST API.
    /// Default: "https://api.github.com"
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

impl GithubConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            branch: default_branch(),
            api_base_url: default_api_base_url(),
        }
    }

    /// Sets the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Returns the access token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the repository owner.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the repository name.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the branch.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Returns the names of required fields that are empty.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("github.token", &self.token),
            ("github.owner", &self.owner),
            ("github.repo", &self.repo),
            ("github.path", &self.path),
            ("github.branch", &self.branch),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct ContentMetadata {
    sha: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    message: String,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

/// Record store backed by a JSON file in a GitHub repository.
#[derive(Clone)]
pub struct GithubStore {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubStore {
    /// Creates a store for the configured document.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GithubConfig) -> Result<Self, Report<StoreError>> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Transport {
                reason: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            self.config.path.trim_start_matches('/'),
        )
    }

    fn read_request(&self, media_type: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.contents_url())
            .query(&[("ref", self.config.branch.as_str())])
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(ACCEPT, media_type)
            .timeout(READ_TIMEOUT)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Report<StoreError>> {
        request.send().await.map_err(|e| {
            StoreError::Transport {
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn reject(&self, response: reqwest::Response) -> Report<StoreError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return StoreError::NotFound {
                location: self.location(),
            }
            .into();
        }

        let body = response.text().await.unwrap_or_default();
        StoreError::UnexpectedStatus {
            status: status.as_u16(),
            body: excerpt(&body),
        }
        .into()
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT).collect()
}

fn commit_message(count: usize) -> String {
    format!(
        "Bot update: {count} records - {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[async_trait]
impl RecordStore for GithubStore {
    fn location(&self) -> String {
        format!(
            "{}/{}:{}",
            self.config.owner, self.config.repo, self.config.path
        )
    }

    #[instrument(skip(self), fields(location = %self.location()))]
    async fn fetch(&self) -> Result<Vec<Record>, Report<StoreError>> {
        let response = self.send(self.read_request(RAW_MEDIA_TYPE)).await?;
        if !response.status().is_success() {
            return Err(self.reject(response).await);
        }

        let body = response.text().await.map_err(|e| StoreError::Transport {
            reason: e.to_string(),
        })?;
        let records = parse_document(&body)?;

        debug!(count = records.len(), "fetched records");
        Ok(records)
    }

    #[instrument(skip(self), fields(location = %self.location()))]
    async fn revision(&self) -> Result<String, Report<StoreError>> {
        let response = self.send(self.read_request(JSON_MEDIA_TYPE)).await?;
        if !response.status().is_success() {
            return Err(self.reject(response).await);
        }

        let metadata: ContentMetadata =
            response
                .json()
                .await
                .map_err(|e| StoreError::MalformedDocument {
                    reason: format!("metadata without sha: {e}"),
                })?;

        debug!(sha = %metadata.sha, "fetched revision");
        Ok(metadata.sha)
    }

    #[instrument(skip(self, records), fields(location = %self.location(), count = records.len()))]
    async fn update(&self, records: &[Record], revision: &str) -> Result<(), Report<StoreError>> {
        let document = serde_json::to_string_pretty(records).map_err(|e| StoreError::Encoding {
            reason: e.to_string(),
        })?;

        let body = UpdateRequest {
            message: commit_message(records.len()),
            content: BASE64.encode(document.as_bytes()),
            sha: revision,
            branch: &self.config.branch,
        };

        let request = self
            .client
            .put(self.contents_url())
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .json(&body)
            .timeout(WRITE_TIMEOUT);

        let response = self.send(request).await?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                debug!("document updated");
                Ok(())
            }
            StatusCode::CONFLICT => Err(StoreError::Conflict {
                revision: revision.to_string(),
            }
            .into()),
            _ => Err(self.reject(response).await),
        }
    }

    async fn status(&self) -> StoreStatus {
        match self.read_request(JSON_MEDIA_TYPE).send().await {
            Ok(response) => StoreStatus {
                exists: response.status().is_success(),
                status_code: Some(response.status().as_u16()),
            },
            Err(e) => {
                warn!(error = %e, location = %self.location(), "status check failed");
                StoreStatus {
                    exists: false,
                    status_code: None,
                }
            }
        }
    }
}
