//! Error types for the aggregation pipeline.
//!
//! Remote failures are always recoverable at the pipeline level (the file or
//! project simply contributes nothing). Only [`AggregationError`] reaches the
//! caller of an aggregation.

use crate::models::ValidationReport;
use std::fmt;
use thiserror::Error;

/// Failure of a single call against the source-control API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure, including timeouts.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The resource does not exist at the requested ref.
    #[error("{url} not found")]
    NotFound { url: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The payload could not be decoded into text.
    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    /// A URL could not be built from the configured base and identifiers.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// True when the remote reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Failure to turn one YAML file into bookmarks.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("bookmark '{name}' has malformed packages: {reason}")]
    Packages { name: String, reason: String },
}

/// One bookmark involved in a URL collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub name: String,
    pub source: String,
}

/// Every record sharing one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateUrl {
    pub url: String,
    pub records: Vec<Collision>,
}

/// Full description of the URL collisions found in one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport(pub Vec<DuplicateUrl>);

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Duplicate URLs found:")?;
        for dup in &self.0 {
            writeln!(f, "URL: {}", dup.url)?;
            for record in &dup.records {
                writeln!(f, "  - {} ({})", record.name, record.source)?;
            }
        }
        Ok(())
    }
}

/// Hard failures of an aggregation request.
#[derive(Debug, Clone, Error)]
pub enum AggregationError {
    #[error("{0}")]
    DuplicateUrls(DuplicateReport),

    #[error("schema validation failed for {} file(s)", .0.len())]
    SchemaViolations(Vec<ValidationReport>),
}
