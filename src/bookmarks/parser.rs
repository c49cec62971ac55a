//! YAML decoding of bookmark files.
//!
//! Each file holds a list of bookmarks. A file that fails to decode is
//! logged and dropped; the rest of the batch is unaffected.

use crate::error::ParseError;
use crate::models::{AggregatedDataset, Bookmark, SourceKey};
use crate::tree::{build_package_tree, TreeNode};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Bookmark exactly as written in YAML. Unknown keys (including any
/// user-supplied `sourceKey`) are ignored.
#[derive(Debug, Deserialize)]
struct RawBookmark {
    name: String,
    url: String,
    domain: String,
    category: String,
    #[serde(default)]
    packages: Option<Value>,
    #[serde(default)]
    meta: Option<BTreeMap<String, serde_json::Value>>,
}

/// The two accepted shapes of the `packages` field.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageField {
    /// Legacy form: `["/dev/doc/gitlab", ...]`.
    LegacyPaths(Vec<String>),
    /// Nested form: `[{key: dev, children: [...]}, ...]`.
    Nested(Vec<TreeNode>),
}

impl PackageField {
    /// Decide the variant from the first element, then decode the whole list.
    pub fn decode(value: Value) -> Result<Self, String> {
        let items = match value {
            Value::Null => return Ok(PackageField::Nested(Vec::new())),
            Value::Sequence(items) => items,
            other => return Err(format!("expected a list, found {}", kind_of(&other))),
        };

        match items.first() {
            None => Ok(PackageField::Nested(Vec::new())),
            Some(Value::String(_)) => {
                let paths = serde_yaml::from_value(Value::Sequence(items))
                    .map_err(|e| format!("legacy package list: {}", e))?;
                Ok(PackageField::LegacyPaths(paths))
            }
            Some(Value::Mapping(_)) => {
                let nodes = serde_yaml::from_value(Value::Sequence(items))
                    .map_err(|e| format!("nested package tree: {}", e))?;
                Ok(PackageField::Nested(nodes))
            }
            Some(other) => Err(format!(
                "list items must be strings or objects, found {}",
                kind_of(other)
            )),
        }
    }

    /// Normalize to nested form: legacy paths are folded into a tree whose
    /// top-level children become the package list.
    pub fn into_nodes(self) -> Vec<TreeNode> {
        match self {
            PackageField::Nested(nodes) => nodes,
            PackageField::LegacyPaths(paths) => build_package_tree(&paths).children,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "an object",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Decode one file into bookmarks tagged with `source`.
pub fn parse_file(content: &str, source: &SourceKey) -> Result<Vec<Bookmark>, ParseError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let raw: Option<Vec<RawBookmark>> = serde_yaml::from_str(content)?;
    let raw = raw.unwrap_or_default();

    let mut bookmarks = Vec::with_capacity(raw.len());
    for item in raw {
        let packages = match item.packages {
            Some(value) => PackageField::decode(value)
                .map_err(|reason| ParseError::Packages {
                    name: item.name.clone(),
                    reason,
                })?
                .into_nodes(),
            None => Vec::new(),
        };

        let mut meta = item.meta.unwrap_or_default();
        meta.insert(
            "module".to_string(),
            serde_json::Value::String(source.module().to_string()),
        );

        bookmarks.push(Bookmark {
            name: item.name,
            url: item.url,
            domain: item.domain,
            category: item.category,
            packages,
            meta,
            source_key: source.clone(),
        });
    }

    Ok(bookmarks)
}

/// Result of parsing every file of a dataset.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub bookmarks: Vec<Bookmark>,
    /// Files that could not be parsed, with the reason.
    pub failures: Vec<(SourceKey, String)>,
}

/// Parse all files, in dataset key order. Never fails as a whole.
pub fn parse_dataset(dataset: &AggregatedDataset) -> ParsedBatch {
    let mut batch = ParsedBatch::default();

    for (source, content) in dataset {
        match parse_file(content, source) {
            Ok(bookmarks) => {
                debug!("Parsed {} bookmarks from {}", bookmarks.len(), source);
                batch.bookmarks.extend(bookmarks);
            }
            Err(e) => {
                warn!("Skipping {}: {}", source, e);
                batch.failures.push((source.clone(), e.to_string()));
            }
        }
    }

    batch
}
