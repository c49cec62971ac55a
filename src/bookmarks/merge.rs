//! Merging of parsed bookmarks and duplicate detection.

use crate::error::{AggregationError, Collision, DuplicateReport, DuplicateUrl};
use crate::models::Bookmark;
use std::collections::BTreeMap;
use tracing::error;

/// Group bookmarks by URL, preserving input order within each group.
pub fn group_by_url(bookmarks: &[Bookmark]) -> BTreeMap<&str, Vec<&Bookmark>> {
    let mut grouped: BTreeMap<&str, Vec<&Bookmark>> = BTreeMap::new();

    for bookmark in bookmarks {
        grouped
            .entry(bookmark.url.as_str())
            .or_default()
            .push(bookmark);
    }

    grouped
}

/// Group bookmarks by category path.
pub fn group_by_category(bookmarks: &[Bookmark]) -> BTreeMap<&str, Vec<&Bookmark>> {
    let mut grouped: BTreeMap<&str, Vec<&Bookmark>> = BTreeMap::new();

    for bookmark in bookmarks {
        grouped
            .entry(bookmark.category.as_str())
            .or_default()
            .push(bookmark);
    }

    grouped
}

/// Every URL used by more than one bookmark, or `None` when URLs are unique.
pub fn find_duplicates(bookmarks: &[Bookmark]) -> Option<DuplicateReport> {
    let duplicates: Vec<DuplicateUrl> = group_by_url(bookmarks)
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(url, group)| DuplicateUrl {
            url: url.to_string(),
            records: group
                .into_iter()
                .map(|b| Collision {
                    name: b.name.clone(),
                    source: b.source_key.to_string(),
                })
                .collect(),
        })
        .collect();

    if duplicates.is_empty() {
        None
    } else {
        Some(DuplicateReport(duplicates))
    }
}

/// Accept the merged batch only if every URL is unique.
pub fn merge(bookmarks: Vec<Bookmark>) -> Result<Vec<Bookmark>, AggregationError> {
    match find_duplicates(&bookmarks) {
        None => Ok(bookmarks),
        Some(report) => {
            error!("{}", report);
            Err(AggregationError::DuplicateUrls(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKey;

    fn bookmark(name: &str, url: &str, category: &str, path: &str) -> Bookmark {
        Bookmark {
            name: name.to_string(),
            url: url.to_string(),
            domain: "example".to_string(),
            category: category.to_string(),
            packages: Vec::new(),
            meta: Default::default(),
            source_key: SourceKey::new("team/links", path),
        }
    }

    #[test]
    fn test_unique_urls_pass_through() {
        let input = vec![
            bookmark("A", "https://a", "X", "f1.yml"),
            bookmark("B", "https://b", "X", "f2.yml"),
        ];
        let merged = merge(input.clone()).unwrap();
        assert_eq!(merged, input);
    }

    #[test]
    fn test_duplicate_across_files_is_rejected() {
        let input = vec![
            bookmark("A", "https://x", "X", "f1.yml"),
            bookmark("B", "https://x", "Y", "f2.yml"),
        ];

        let err = merge(input).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("https://x"));
        assert!(message.contains("A (team/links:f1.yml)"));
        assert!(message.contains("B (team/links:f2.yml)"));
    }

    #[test]
    fn test_every_duplicate_url_is_enumerated() {
        let input = vec![
            bookmark("A", "https://x", "X", "f1.yml"),
            bookmark("B", "https://y", "X", "f1.yml"),
            bookmark("C", "https://x", "X", "f2.yml"),
            bookmark("D", "https://y", "X", "f3.yml"),
            bookmark("E", "https://z", "X", "f3.yml"),
        ];

        let report = find_duplicates(&input).unwrap();
        let urls: Vec<_> = report.0.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x", "https://y"]);
        assert_eq!(report.0[0].records.len(), 2);
        assert_eq!(report.0[1].records[1].name, "D");
    }

    #[test]
    fn test_group_by_category() {
        let input = vec![
            bookmark("A", "https://a", "Dev", "f1.yml"),
            bookmark("B", "https://b", "Ops", "f1.yml"),
            bookmark("C", "https://c", "Dev", "f2.yml"),
        ];

        let grouped = group_by_category(&input);
        assert_eq!(grouped.get("Dev").map(|v| v.len()), Some(2));
        assert_eq!(grouped.get("Ops").map(|v| v.len()), Some(1));
    }
}
