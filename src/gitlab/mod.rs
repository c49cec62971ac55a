//! GitLab traversal: API client, group expansion, tree walking and file
//! retrieval.

pub mod client;
pub mod expander;
pub mod fetcher;
pub mod walker;

#[cfg(test)]
pub mod fake;

pub use client::{GitLabApi, GitLabClient};
pub use expander::GroupExpander;
pub use fetcher::{build_fetcher, ContentFetcher};
pub use walker::TreeWalker;

use crate::error::RemoteError;
use std::future::Future;
use tracing::warn;

/// Upper bound on pages read from one listing.
const MAX_PAGES: u32 = 1000;

/// Read a paged listing until the first empty page.
pub(crate) async fn collect_pages<T, F, Fut>(what: &str, mut fetch: F) -> Result<Vec<T>, RemoteError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, RemoteError>>,
{
    let mut items = Vec::new();

    for page in 1..=MAX_PAGES {
        let batch = fetch(page).await?;
        if batch.is_empty() {
            return Ok(items);
        }
        items.extend(batch);
    }

    warn!("Stopped listing {} after {} pages", what, MAX_PAGES);
    Ok(items)
}
