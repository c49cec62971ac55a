//! Aggregation pipeline.
//!
//! A cache miss expands the configured groups into projects, walks every
//! project for data files, fetches them, validates and parses the contents,
//! rejects duplicate URLs and folds the categories into a tree. The result is
//! stored as one [`Snapshot`] in the dataset cache.

use crate::bookmarks::{merge, parse_dataset, schema, SchemaValidator};
use crate::cache::DatasetCache;
use crate::config::Config;
use crate::error::{AggregationError, RemoteError};
use crate::gitlab::{build_fetcher, ContentFetcher, GitLabApi, GitLabClient, GroupExpander, TreeWalker};
use crate::models::{
    AggregatedDataset, AggregationStats, Bookmark, ProjectRef, RepositoryLocation, SourceKey,
    ValidationReport,
};
use crate::tree::{build_category_tree, TreeNode};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything derived from one gathering of the remote data. Never mutated
/// after it is built.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(skip)]
    pub dataset: AggregatedDataset,
    pub bookmarks: Vec<Bookmark>,
    /// Files with schema violations.
    pub validation: Vec<ValidationReport>,
    pub category_tree: TreeNode,
    pub stats: AggregationStats,
    pub built_at: DateTime<Utc>,
}

/// Where the data lives.
#[derive(Debug, Clone)]
struct Sources {
    root_group: Option<String>,
    groups: Vec<String>,
    projects: Vec<String>,
    git_ref: String,
    data_path: String,
}

pub struct Aggregator {
    fetcher: Arc<dyn ContentFetcher>,
    expander: GroupExpander,
    walker: TreeWalker,
    validator: SchemaValidator,
    cache: DatasetCache<Snapshot, AggregationError>,
    sources: Sources,
    concurrency: usize,
    strict: bool,
}

impl Aggregator {
    pub fn new(api: Arc<dyn GitLabApi>, fetcher: Arc<dyn ContentFetcher>, config: &Config) -> Self {
        let gitlab = &config.gitlab;
        let concurrency = gitlab.max_in_flight.max(1);

        Self {
            fetcher,
            expander: GroupExpander::new(Arc::clone(&api), concurrency),
            walker: TreeWalker::new(api, &gitlab.extensions),
            validator: SchemaValidator::new(),
            cache: DatasetCache::from_config(&config.cache),
            sources: Sources {
                root_group: gitlab.root_group_id.clone(),
                groups: gitlab.groups.clone(),
                projects: gitlab.projects.clone(),
                git_ref: gitlab.branch.clone(),
                data_path: gitlab.data_path.clone(),
            },
            concurrency,
            strict: config.validation.strict,
        }
    }

    /// Aggregator backed by a real GitLab client.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        let client = Arc::new(GitLabClient::new(&config.gitlab)?);
        let fetcher = build_fetcher(config.gitlab.fetch_strategy, Arc::clone(&client));
        Ok(Self::new(client, fetcher, config))
    }

    /// The current snapshot, gathering it on a cache miss.
    pub async fn fetch_all(&self) -> Result<Arc<Snapshot>, AggregationError> {
        self.cache.get_or_populate(|| self.build_snapshot()).await
    }

    /// Aggregated bookmarks.
    pub async fn bookmarks(&self) -> Result<Vec<Bookmark>, AggregationError> {
        Ok(self.fetch_all().await?.bookmarks.clone())
    }

    /// Category tree of the aggregated bookmarks.
    pub async fn category_tree(&self) -> Result<TreeNode, AggregationError> {
        Ok(self.fetch_all().await?.category_tree.clone())
    }

    /// Drop the cached snapshot; the next request gathers again.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    /// Expand groups, add fallback projects, and address each at the
    /// configured ref and data path.
    pub async fn locations(&self) -> Vec<RepositoryLocation> {
        let mut roots = Vec::new();
        match self.sources.root_group.as_deref() {
            Some(root) => roots.push(root.to_string()),
            None if self.sources.projects.is_empty() && self.sources.groups.is_empty() => {
                warn!("No root group, groups or projects configured; dataset will be empty")
            }
            None => {}
        }
        roots.extend(self.sources.groups.iter().cloned());

        let mut projects = if roots.is_empty() {
            Vec::new()
        } else {
            self.expander.expand_all(&roots).await
        };

        let mut seen: HashSet<String> = projects.iter().map(|p| p.id.clone()).collect();
        for identifier in &self.sources.projects {
            let identifier = identifier.trim();
            let known = projects
                .iter()
                .any(|p| p.path_with_namespace.as_deref() == Some(identifier));
            if !identifier.is_empty() && !known && seen.insert(identifier.to_string()) {
                projects.push(ProjectRef::from_identifier(identifier));
            }
        }

        projects
            .into_iter()
            .map(|project| RepositoryLocation {
                project,
                git_ref: self.sources.git_ref.clone(),
                root_path: self.sources.data_path.clone(),
            })
            .collect()
    }

    /// Walk every location concurrently. Projects that cannot be walked are
    /// skipped.
    async fn discover(&self, locations: Vec<RepositoryLocation>) -> Vec<(Arc<RepositoryLocation>, String)> {
        let walked: Vec<_> = stream::iter(locations)
            .map(|location| async move {
                let result = self.walker.walk(&location).await;
                (location, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut files = Vec::new();
        for (location, result) in walked {
            match result {
                Ok(paths) => {
                    let location = Arc::new(location);
                    files.extend(paths.into_iter().map(|path| (Arc::clone(&location), path)));
                }
                Err(e) => warn!("Failed to walk {}: {}", location.project.display_name(), e),
            }
        }
        files
    }

    /// Files a gathering would fetch, without fetching them.
    pub async fn list_source_files(&self) -> Vec<SourceKey> {
        let locations = self.locations().await;
        let mut keys: Vec<SourceKey> = self
            .discover(locations)
            .await
            .iter()
            .map(|(location, path)| location.source_key(path))
            .collect();
        keys.sort();
        keys
    }

    /// Fetch every discovered file. Failed files are left out.
    async fn collect_sources(&self, stats: &mut AggregationStats) -> AggregatedDataset {
        let locations = self.locations().await;
        stats.projects = locations.len();

        let files = self.discover(locations).await;
        stats.files_listed = files.len();

        let fetched: Vec<_> = stream::iter(files)
            .map(|(location, path)| async move {
                let result = self.fetcher.fetch(&location, &path).await;
                (location.source_key(&path), result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut dataset = AggregatedDataset::new();
        for (source, result) in fetched {
            match result {
                Ok(content) => {
                    dataset.insert(source, content);
                }
                Err(e) => {
                    warn!("Failed to fetch {}: {}", source, e);
                    stats.fetch_failures += 1;
                }
            }
        }
        stats.files_fetched = dataset.len();
        dataset
    }

    async fn build_snapshot(&self) -> Result<Snapshot, AggregationError> {
        info!("Gathering bookmark data");
        let mut stats = AggregationStats::default();

        let dataset = self.collect_sources(&mut stats).await;

        let validation = schema::failed_reports(&self.validator.validate_all(&dataset));
        stats.invalid_files = validation.len();
        if !validation.is_empty() {
            warn!("{}", schema::describe(&validation).trim_end());
            if self.strict {
                return Err(AggregationError::SchemaViolations(validation));
            }
        }

        let parsed = parse_dataset(&dataset);
        stats.parse_failures = parsed.failures.len();

        let bookmarks = merge(parsed.bookmarks)?;
        let category_tree = build_category_tree(bookmarks.iter().map(|b| b.category.as_str()));
        debug!(
            "Category tree has {} node(s); storing in '{}'",
            category_tree.descendant_count(),
            self.cache.name()
        );

        info!(
            "Aggregated {} bookmark(s) from {} file(s) in {} project(s) ({} fetch failure(s), {} parse failure(s), {} invalid file(s))",
            bookmarks.len(),
            stats.files_fetched,
            stats.projects,
            stats.fetch_failures,
            stats.parse_failures,
            stats.invalid_files
        );

        Ok(Snapshot {
            dataset,
            bookmarks,
            validation,
            category_tree,
            stats,
            built_at: Utc::now(),
        })
    }
}
