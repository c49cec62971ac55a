//! HTTP client for the GitLab REST API.
//!
//! All requests share one connection pool, carry the configured timeout and
//! bearer token, and are bounded by a semaphore so that fan-out elsewhere in
//! the pipeline never exceeds the configured number of in-flight requests.

use crate::config::GitLabConfig;
use crate::error::RemoteError;
use crate::models::{GroupRef, ProjectRef, TreeEntry};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// The listing endpoints the traversal needs. Pages are 1-based; an empty
/// page marks the end of a listing.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    async fn list_subgroups(&self, group_id: &str, page: u32) -> Result<Vec<GroupRef>, RemoteError>;

    async fn list_projects(&self, group_id: &str, page: u32)
        -> Result<Vec<ProjectRef>, RemoteError>;

    async fn list_tree(
        &self,
        project_id: &str,
        path: &str,
        git_ref: &str,
        page: u32,
    ) -> Result<Vec<TreeEntry>, RemoteError>;
}

/// Body of the repository files endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FilePayload {
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Concrete GitLab client.
pub struct GitLabClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
    per_page: u32,
    permits: Arc<Semaphore>,
}

impl GitLabClient {
    /// Build a client from configuration.
    pub fn new(config: &GitLabConfig) -> Result<Self, RemoteError> {
        let base = Url::parse(&config.api_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", config.api_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("bookmarkd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| RemoteError::Http {
                url: config.api_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base,
            token: config.access_token.clone().filter(|t| !t.is_empty()),
            per_page: config.per_page.max(1),
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        })
    }

    /// URL under the instance base, one path segment per element.
    /// Segments are percent-encoded, so `team/links` becomes `team%2Flinks`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Web URL serving the raw file, e.g. `{base}/team/links/-/raw/main/data/a.yml`.
    pub fn raw_url(&self, project_path: &str, git_ref: &str, file_path: &str) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::InvalidUrl(self.base.to_string()))?;
            segments.pop_if_empty();
            segments.extend(project_path.split('/').filter(|s| !s.is_empty()));
            segments.extend(["-", "raw"]);
            segments.extend(git_ref.split('/').filter(|s| !s.is_empty()));
            segments.extend(file_path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<reqwest::Response, RemoteError> {
        debug!("GET {}", url);
        let mut request = self.http.get(url.clone()).query(query);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| RemoteError::Http {
            url: url.to_string(),
            source,
        })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound {
                url: url.to_string(),
            }),
            status => Err(RemoteError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        // The semaphore is never closed; the permit covers the body read too.
        let _permit = self.permits.acquire().await.ok();
        let display = url.to_string();
        let response = self.get(url, query).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| RemoteError::Http { url: display, source })
    }

    async fn get_text(&self, url: Url, query: &[(&str, String)]) -> Result<String, RemoteError> {
        let _permit = self.permits.acquire().await.ok();
        let display = url.to_string();
        let response = self.get(url, query).await?;
        response
            .text()
            .await
            .map_err(|source| RemoteError::Http { url: display, source })
    }

    fn page_query(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", self.per_page.to_string()),
            ("page", page.to_string()),
        ]
    }

    /// Read a file through the files API (base64 body).
    pub async fn get_file(
        &self,
        project_id: &str,
        file_path: &str,
        git_ref: &str,
    ) -> Result<FilePayload, RemoteError> {
        let url = self.endpoint(&[
            "api",
            "v4",
            "projects",
            project_id,
            "repository",
            "files",
            file_path,
        ])?;
        self.get_json(url, &[("ref", git_ref.to_string())]).await
    }

    /// Read a file from its raw web URL.
    pub async fn get_raw(
        &self,
        project_path: &str,
        git_ref: &str,
        file_path: &str,
    ) -> Result<String, RemoteError> {
        let url = self.raw_url(project_path, git_ref, file_path)?;
        self.get_text(url, &[]).await
    }
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn list_subgroups(&self, group_id: &str, page: u32) -> Result<Vec<GroupRef>, RemoteError> {
        let url = self.endpoint(&["api", "v4", "groups", group_id, "subgroups"])?;
        self.get_json(url, &self.page_query(page)).await
    }

    async fn list_projects(
        &self,
        group_id: &str,
        page: u32,
    ) -> Result<Vec<ProjectRef>, RemoteError> {
        let url = self.endpoint(&["api", "v4", "groups", group_id, "projects"])?;
        self.get_json(url, &self.page_query(page)).await
    }

    async fn list_tree(
        &self,
        project_id: &str,
        path: &str,
        git_ref: &str,
        page: u32,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        let url = self.endpoint(&["api", "v4", "projects", project_id, "repository", "tree"])?;
        let mut query = self.page_query(page);
        query.push(("ref", git_ref.to_string()));
        if !path.is_empty() {
            query.push(("path", path.to_string()));
        }
        self.get_json(url, &query).await
    }
}
