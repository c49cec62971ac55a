//! Markdown and JSON report generation.

use super::{Report, ReportMetadata};
use crate::bookmarks::group_by_category;
use crate::models::{AggregatedDataset, AggregationStats, Bookmark, ValidationReport};
use crate::tree::TreeNode;
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let snapshot = report.snapshot;
    let mut output = String::new();

    output.push_str("# Bookmark Aggregation Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_statistics_section(&snapshot.stats, snapshot.bookmarks.len()));
    output.push_str(&generate_sources_section(&snapshot.dataset));
    output.push_str(&generate_validation_section(&snapshot.validation));
    output.push_str(&generate_tree_section(&snapshot.category_tree));
    output.push_str(&generate_bookmarks_section(&snapshot.bookmarks));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **GitLab:** {}\n", metadata.gitlab_url));
    if let Some(ref group) = metadata.root_group {
        section.push_str(&format!("- **Root Group:** `{}`\n", group));
    }
    section.push_str(&format!("- **Ref:** `{}`\n", metadata.git_ref));
    if !metadata.data_path.is_empty() {
        section.push_str(&format!("- **Data Path:** `{}`\n", metadata.data_path));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_statistics_section(stats: &AggregationStats, bookmarks: usize) -> String {
    let mut section = String::new();

    section.push_str("## Statistics\n\n");
    section.push_str("| Projects | Files Listed | Files Fetched | Fetch Failures | Parse Failures | Invalid Files | **Bookmarks** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | **{}** |\n\n",
        stats.projects,
        stats.files_listed,
        stats.files_fetched,
        stats.fetch_failures,
        stats.parse_failures,
        stats.invalid_files,
        bookmarks
    ));

    section
}

fn generate_sources_section(dataset: &AggregatedDataset) -> String {
    let mut section = String::new();

    section.push_str("## Sources\n\n");

    if dataset.is_empty() {
        section.push_str("No data files were fetched.\n\n");
        return section;
    }

    section.push_str("| File | Lines |\n");
    section.push_str("|:---|:---:|\n");
    for (source, content) in dataset {
        section.push_str(&format!("| `{}` | {} |\n", source, content.lines().count()));
    }
    section.push('\n');

    section
}

fn generate_validation_section(reports: &[ValidationReport]) -> String {
    let mut section = String::new();

    section.push_str("## Validation Findings\n\n");

    if reports.is_empty() {
        section.push_str("Every file matches the bookmark schema.\n\n");
        return section;
    }

    for report in reports {
        section.push_str(&format!("### `{}`\n\n", report.source));
        for violation in &report.violations {
            section.push_str(&format!("- {}\n", violation));
        }
        section.push('\n');
    }

    section
}

fn generate_tree_section(tree: &TreeNode) -> String {
    let mut section = String::new();

    section.push_str("## Categories\n\n");

    if tree.children.is_empty() {
        section.push_str("No categories.\n\n");
        return section;
    }

    for child in &tree.children {
        push_tree_lines(&mut section, child, 0);
    }
    section.push('\n');

    section
}

fn push_tree_lines(out: &mut String, node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let total = node.subtree_count();
    out.push_str(&format!("{}- {} ({})\n", indent, node.label, total));
    for child in &node.children {
        push_tree_lines(out, child, depth + 1);
    }
}

fn generate_bookmarks_section(bookmarks: &[Bookmark]) -> String {
    let mut section = String::new();

    section.push_str("## Bookmarks\n\n");

    if bookmarks.is_empty() {
        section.push_str("No bookmarks were found.\n\n");
        return section;
    }

    for (category, entries) in group_by_category(bookmarks) {
        section.push_str(&format!("### {}\n\n", category));
        section.push_str("| Name | URL | Source |\n");
        section.push_str("|:---|:---|:---|\n");
        for bookmark in entries {
            section.push_str(&format!(
                "| {} | <{}> | `{}` |\n",
                escape_cell(&bookmark.name),
                bookmark.url,
                bookmark.source_key
            ));
        }
        section.push('\n');
    }

    section
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by bookmarkd v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
