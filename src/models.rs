//! Data models for the bookmark aggregator.
//!
//! This module contains the core data structures shared by the remote
//! traversal, the parsing pipeline and the HTTP surface.

use crate::tree::TreeNode;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between the repository and the file path in a [`SourceKey`].
pub const SOURCE_KEY_SEPARATOR: char = ':';

/// Provenance of a bookmark: which repository and file produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceKey {
    /// Repository identifier (path with namespace when known, otherwise id).
    pub repository: String,
    /// File path relative to the repository root.
    pub path: String,
}

impl SourceKey {
    pub fn new(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            path: path.into(),
        }
    }

    /// Parse a composite key of the form `repository:path`.
    ///
    /// Keys without a separator are attributed to an `unknown` repository.
    #[cfg(test)]
    pub fn parse(composite: &str) -> Self {
        match composite.split_once(SOURCE_KEY_SEPARATOR) {
            Some((repository, path)) => Self::new(repository, path),
            None => Self::new("unknown", composite),
        }
    }

    /// Module name injected into bookmark metadata.
    pub fn module(&self) -> &str {
        &self.repository
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.repository, SOURCE_KEY_SEPARATOR, self.path)
    }
}

impl Serialize for SourceKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Raw file contents keyed by provenance. This is what a cache miss gathers.
pub type AggregatedDataset = BTreeMap<SourceKey, String>;

/// A single bookmark record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Display name.
    pub name: String,
    /// Target URL, unique across the merged dataset.
    pub url: String,
    /// Domain of the URL.
    pub domain: String,
    /// Category path in the form `Parent/Child/Grandchild`.
    pub category: String,
    /// Package hierarchy, always in nested form.
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_packages")]
    pub packages: Vec<TreeNode>,
    /// Free-form metadata. Always contains `module`.
    pub meta: BTreeMap<String, serde_json::Value>,
    /// Set by the pipeline only.
    pub source_key: SourceKey,
}

/// Package nodes go out under `key`, the same field the nested input uses.
struct PackageNode<'a>(&'a TreeNode);

impl Serialize for PackageNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.0;
        let has_children = !node.children.is_empty();
        let mut map = serializer.serialize_map(Some(if has_children { 2 } else { 1 }))?;
        map.serialize_entry("key", &node.label)?;
        if has_children {
            map.serialize_entry("children", &node.children.iter().map(PackageNode).collect::<Vec<_>>())?;
        }
        map.end()
    }
}

fn serialize_packages<S: Serializer>(packages: &[TreeNode], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(packages.iter().map(PackageNode))
}

/// Schema findings for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub source: SourceKey,
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A GitLab group as returned by the subgroups endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupRef {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub full_path: Option<String>,
}

/// A GitLab project as returned by the projects endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectRef {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
}

impl ProjectRef {
    /// A project known only by a configured id or path.
    pub fn from_identifier(identifier: impl Into<String>) -> Self {
        Self {
            id: identifier.into(),
            path_with_namespace: None,
        }
    }

    /// Human-readable name used in provenance keys and raw URLs.
    pub fn display_name(&self) -> &str {
        self.path_with_namespace.as_deref().unwrap_or(&self.id)
    }
}

/// Addresses a file set inside one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    pub project: ProjectRef,
    pub git_ref: String,
    pub root_path: String,
}

impl RepositoryLocation {
    pub fn source_key(&self, path: &str) -> SourceKey {
        SourceKey::new(self.project.display_name(), path)
    }
}

/// Kind of an entry in a repository tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Directory.
    Tree,
    /// Regular file.
    Blob,
    /// Submodules and anything else.
    #[serde(other)]
    Other,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// Counters collected while gathering one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub projects: usize,
    pub files_listed: usize,
    pub files_fetched: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub invalid_files: usize,
}

/// GitLab ids are numbers, configured identifiers are strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}
