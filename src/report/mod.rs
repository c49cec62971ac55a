//! One-shot aggregation reports (`--once`).

mod generator;

pub use generator::{generate_json_report, generate_markdown_report};

use crate::aggregator::Snapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where and when the reported data was gathered.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub gitlab_url: String,
    pub root_group: Option<String>,
    pub git_ref: String,
    pub data_path: String,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// A snapshot plus its metadata.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub snapshot: &'a Snapshot,
}
