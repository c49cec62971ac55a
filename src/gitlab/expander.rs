//! Resolution of groups into the projects they (transitively) contain.

use crate::gitlab::{collect_pages, GitLabApi};
use crate::models::{GroupRef, ProjectRef};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Expands groups level by level, listing each level's groups concurrently.
pub struct GroupExpander {
    api: Arc<dyn GitLabApi>,
    concurrency: usize,
}

impl GroupExpander {
    pub fn new(api: Arc<dyn GitLabApi>, concurrency: usize) -> Self {
        Self {
            api,
            concurrency: concurrency.max(1),
        }
    }

    /// Every project under `root`, nested subgroups included, deduplicated.
    ///
    /// A blank root yields an empty list and a warning. Groups that cannot be
    /// listed are skipped.
    pub async fn expand(&self, root: &str) -> Vec<ProjectRef> {
        self.expand_all(&[root.to_string()]).await
    }

    /// Like [`expand`](Self::expand) for several roots at once.
    pub async fn expand_all(&self, roots: &[String]) -> Vec<ProjectRef> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_projects: HashSet<String> = HashSet::new();
        let mut projects = Vec::new();

        let mut frontier: Vec<String> = Vec::new();
        for root in roots {
            let root = root.trim();
            if root.is_empty() {
                warn!("Group id is blank; nothing to expand");
                continue;
            }
            if visited.insert(root.to_string()) {
                frontier.push(root.to_string());
            }
        }

        while !frontier.is_empty() {
            let level: Vec<(Vec<ProjectRef>, Vec<GroupRef>)> = stream::iter(frontier.drain(..))
                .map(|group| async move { self.expand_one(&group).await })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for (found_projects, subgroups) in level {
                for project in found_projects {
                    if seen_projects.insert(project.id.clone()) {
                        projects.push(project);
                    }
                }
                for group in subgroups {
                    if visited.insert(group.id.clone()) {
                        frontier.push(group.id);
                    }
                }
            }
        }

        info!(
            "Expanded {} group(s) into {} project(s)",
            visited.len(),
            projects.len()
        );
        projects
    }

    /// Direct projects and subgroups of one group.
    async fn expand_one(&self, group: &str) -> (Vec<ProjectRef>, Vec<GroupRef>) {
        let projects = collect_pages(group, |page| self.api.list_projects(group, page));
        let subgroups = collect_pages(group, |page| self.api.list_subgroups(group, page));
        let (projects, subgroups) = futures::join!(projects, subgroups);

        let projects = projects.unwrap_or_else(|e| {
            warn!("Failed to list projects of group {}: {}", group, e);
            Vec::new()
        });
        let subgroups = subgroups.unwrap_or_else(|e| {
            warn!("Failed to list subgroups of group {}: {}", group, e);
            Vec::new()
        });

        debug!(
            "Group {}: {} project(s), {} subgroup(s)",
            group,
            projects.len(),
            subgroups.len()
        );
        (projects, subgroups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::fake::FakeGitLab;

    fn ids(projects: &[ProjectRef]) -> Vec<&str> {
        let mut ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn test_expands_nested_subgroups_across_pages() {
        let fake = FakeGitLab::new()
            .project("root", "1", "root/a")
            .project("root", "2", "root/b")
            .project("root", "3", "root/c")
            .subgroup("root", "sub")
            .subgroup("sub", "deep")
            .project("deep", "4", "root/sub/deep/d");

        let expander = GroupExpander::new(Arc::new(fake), 4);
        let projects = expander.expand("root").await;

        assert_eq!(ids(&projects), vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_projects_are_deduplicated() {
        let fake = FakeGitLab::new()
            .project("root", "1", "root/a")
            .subgroup("root", "sub")
            .project("sub", "1", "root/a")
            .project("sub", "2", "root/sub/b");

        let expander = GroupExpander::new(Arc::new(fake), 2);
        let projects = expander.expand_all(&["root".to_string(), "sub".to_string()]).await;

        assert_eq!(ids(&projects), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_blank_root_is_empty_not_an_error() {
        let fake = Arc::new(FakeGitLab::new());
        let expander = GroupExpander::new(fake.clone(), 2);

        assert!(expander.expand("").await.is_empty());
        assert!(expander.expand("   ").await.is_empty());
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_broken_group_is_skipped() {
        let fake = FakeGitLab::new()
            .project("root", "1", "root/a")
            .subgroup("root", "bad")
            .broken_group("bad");

        let expander = GroupExpander::new(Arc::new(fake), 2);
        let projects = expander.expand("root").await;

        assert_eq!(ids(&projects), vec!["1"]);
    }
}
