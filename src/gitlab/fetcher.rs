//! File content retrieval.
//!
//! Two interchangeable strategies sit behind [`ContentFetcher`]: the
//! authenticated files API (base64 payload) and the raw web URL.

use crate::config::FetchStrategy;
use crate::error::RemoteError;
use crate::gitlab::client::GitLabClient;
use crate::models::RepositoryLocation;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;

/// Retrieves the text of one file at the location's ref.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, location: &RepositoryLocation, path: &str) -> Result<String, RemoteError>;
}

/// Reads through `GET /projects/:id/repository/files/:path`.
pub struct ApiFetcher {
    client: Arc<GitLabClient>,
}

impl ApiFetcher {
    pub fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for ApiFetcher {
    async fn fetch(&self, location: &RepositoryLocation, path: &str) -> Result<String, RemoteError> {
        let payload = self
            .client
            .get_file(&location.project.id, path, &location.git_ref)
            .await?;

        match payload.encoding.as_deref() {
            Some("base64") | None => decode_base64(&payload.content, path),
            Some("text") => Ok(payload.content),
            Some(other) => Err(RemoteError::Decode {
                path: path.to_string(),
                reason: format!("unsupported encoding '{}'", other),
            }),
        }
    }
}

/// Reads through `{base}/{project}/-/raw/{ref}/{path}`.
pub struct RawFetcher {
    client: Arc<GitLabClient>,
}

impl RawFetcher {
    pub fn new(client: Arc<GitLabClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for RawFetcher {
    async fn fetch(&self, location: &RepositoryLocation, path: &str) -> Result<String, RemoteError> {
        self.client
            .get_raw(location.project.display_name(), &location.git_ref, path)
            .await
    }
}

/// Pick the fetcher for the configured strategy.
pub fn build_fetcher(strategy: FetchStrategy, client: Arc<GitLabClient>) -> Arc<dyn ContentFetcher> {
    match strategy {
        FetchStrategy::Api => Arc::new(ApiFetcher::new(client)),
        FetchStrategy::Raw => Arc::new(RawFetcher::new(client)),
    }
}

/// Decode a base64 body into UTF-8 text. Line breaks in the body are ignored.
pub fn decode_base64(encoded: &str, path: &str) -> Result<String, RemoteError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = STANDARD.decode(compact).map_err(|e| RemoteError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    String::from_utf8(bytes).map_err(|e| RemoteError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}
