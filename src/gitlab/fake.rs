//! In-memory GitLab used by tests. Listings are served in pages of two so
//! paging is always exercised.

use crate::error::RemoteError;
use crate::gitlab::{ContentFetcher, GitLabApi};
use crate::models::{EntryKind, GroupRef, ProjectRef, RepositoryLocation, TreeEntry};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const PAGE_SIZE: usize = 2;

#[derive(Default)]
pub struct FakeGitLab {
    subgroups: HashMap<String, Vec<GroupRef>>,
    projects: HashMap<String, Vec<ProjectRef>>,
    trees: HashMap<(String, String), Vec<TreeEntry>>,
    files: HashMap<(String, String), String>,
    broken_groups: HashSet<String>,
    delay: Option<Duration>,
    listing_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

fn page<T: Clone>(items: &[T], page: u32) -> Vec<T> {
    items
        .iter()
        .skip((page as usize - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .cloned()
        .collect()
}

fn not_found(what: String) -> RemoteError {
    RemoteError::NotFound { url: what }
}

impl FakeGitLab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subgroup(mut self, parent: &str, child: &str) -> Self {
        self.subgroups
            .entry(parent.to_string())
            .or_default()
            .push(GroupRef {
                id: child.to_string(),
                full_path: None,
            });
        self.projects.entry(child.to_string()).or_default();
        self
    }

    pub fn project(mut self, group: &str, id: &str, path: &str) -> Self {
        self.projects
            .entry(group.to_string())
            .or_default()
            .push(ProjectRef {
                id: id.to_string(),
                path_with_namespace: Some(path.to_string()),
            });
        self
    }

    pub fn broken_group(mut self, group: &str) -> Self {
        self.broken_groups.insert(group.to_string());
        self
    }

    /// Register a file; parent directories are created in the tree listings.
    pub fn file(mut self, project: &str, path: &str, content: &str) -> Self {
        self.add_entries(project, path, EntryKind::Blob);
        self.files
            .insert((project.to_string(), path.to_string()), content.to_string());
        self
    }

    /// Register a file that is listed but cannot be fetched.
    pub fn unreadable_file(mut self, project: &str, path: &str) -> Self {
        self.add_entries(project, path, EntryKind::Blob);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn add_entries(&mut self, project: &str, path: &str, kind: EntryKind) {
        let (parent, name) = match path.rsplit_once('/') {
            Some((parent, name)) => (parent.to_string(), name.to_string()),
            None => (String::new(), path.to_string()),
        };

        if !parent.is_empty() {
            self.add_entries(project, &parent, EntryKind::Tree);
        }

        let listing = self
            .trees
            .entry((project.to_string(), parent))
            .or_default();
        if !listing.iter().any(|e| e.path == path) {
            listing.push(TreeEntry {
                name,
                path: path.to_string(),
                kind,
            });
        }
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.listing_calls() + self.fetch_calls()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GitLabApi for FakeGitLab {
    async fn list_subgroups(&self, group_id: &str, p: u32) -> Result<Vec<GroupRef>, RemoteError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.broken_groups.contains(group_id) {
            return Err(RemoteError::InvalidUrl(group_id.to_string()));
        }
        Ok(self
            .subgroups
            .get(group_id)
            .map(|groups| page(groups, p))
            .unwrap_or_default())
    }

    async fn list_projects(&self, group_id: &str, p: u32) -> Result<Vec<ProjectRef>, RemoteError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.broken_groups.contains(group_id) {
            return Err(RemoteError::InvalidUrl(group_id.to_string()));
        }
        match self.projects.get(group_id) {
            Some(projects) => Ok(page(projects, p)),
            None => Err(not_found(format!("group {}", group_id))),
        }
    }

    async fn list_tree(
        &self,
        project_id: &str,
        path: &str,
        _git_ref: &str,
        p: u32,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        match self.trees.get(&(project_id.to_string(), path.to_string())) {
            Some(entries) => Ok(page(entries, p)),
            None => Err(not_found(format!("{}:{}", project_id, path))),
        }
    }
}

#[async_trait]
impl ContentFetcher for FakeGitLab {
    async fn fetch(&self, location: &RepositoryLocation, path: &str) -> Result<String, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.files
            .get(&(location.project.id.clone(), path.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("{}:{}", location.project.id, path)))
    }
}
