//! Remote repository tree walker.
//!
//! Lists a directory through the repository tree endpoint, descends into
//! subdirectories and keeps the files whose extension is accepted.

use crate::error::RemoteError;
use crate::gitlab::{collect_pages, GitLabApi};
use crate::models::{EntryKind, RepositoryLocation, TreeEntry};
use std::sync::Arc;
use tracing::{debug, warn};

/// Discovers data files in one repository.
pub struct TreeWalker {
    api: Arc<dyn GitLabApi>,
    /// Lowercase, without the leading dot.
    extensions: Vec<String>,
}

impl TreeWalker {
    pub fn new(api: Arc<dyn GitLabApi>, extensions: &[String]) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { api, extensions }
    }

    /// Check if a file name passes the extension filter.
    pub fn matches(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }

    /// Paths of every matching file under the location's root path.
    ///
    /// A missing root is an empty repository, not an error. Subdirectories
    /// that fail to list are skipped.
    pub async fn walk(&self, location: &RepositoryLocation) -> Result<Vec<String>, RemoteError> {
        let root = location.root_path.trim_matches('/').to_string();
        let project = location.project.display_name();

        let mut files = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let entries = match self.list(location, &dir).await {
                Ok(entries) => entries,
                Err(e) if dir == root && e.is_not_found() => {
                    debug!("{} has no '{}' directory", project, root);
                    return Ok(Vec::new());
                }
                Err(e) if dir == root => return Err(e),
                Err(e) => {
                    warn!("Skipping {}:{}: {}", project, dir, e);
                    continue;
                }
            };

            for entry in entries {
                match entry.kind {
                    EntryKind::Tree => pending.push(entry.path),
                    EntryKind::Blob if self.matches(&entry.name) => files.push(entry.path),
                    _ => {}
                }
            }
        }

        files.sort();
        debug!("{}: {} matching file(s)", project, files.len());
        Ok(files)
    }

    async fn list(
        &self,
        location: &RepositoryLocation,
        dir: &str,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        collect_pages(dir, |page| {
            self.api
                .list_tree(&location.project.id, dir, &location.git_ref, page)
        })
        .await
    }
}
