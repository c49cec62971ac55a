//! Labelled trees folded from slash-delimited paths.
//!
//! The same folding primitive builds the category tree (where each path
//! counts one arrival at its final node) and package trees (structure only).

use serde::{Deserialize, Serialize};

/// Label of the synthetic root node.
pub const ROOT_LABEL: &str = "root";

/// A node in a category or package tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(rename = "name", alias = "key", alias = "label")]
    pub label: String,
    /// Ordered by first insertion. Labels are unique among siblings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    /// Number of paths that ended exactly at this node.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub count: u64,
}

fn is_zero(count: &u64) -> bool {
    *count == 0
}

impl TreeNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
            count: 0,
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_LABEL)
    }

    /// Return the child with `label`, creating it if absent.
    pub fn add_child(&mut self, label: &str) -> &mut TreeNode {
        let index = match self.children.iter().position(|c| c.label == label) {
            Some(index) => index,
            None => {
                self.children.push(TreeNode::new(label));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    pub fn child(&self, label: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.label == label)
    }

    /// Walk `path` from this node, creating nodes as needed.
    ///
    /// Empty segments are skipped, so leading, trailing and doubled slashes
    /// are harmless. A path without any segment is ignored entirely.
    pub fn insert_path(&mut self, path: &str, count_arrival: bool) {
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        if segments.peek().is_none() {
            return;
        }

        let mut current = self;
        for segment in segments {
            current = current.add_child(segment);
        }
        if count_arrival {
            current.count += 1;
        }
    }

    /// Arrivals at this node and every descendant.
    pub fn subtree_count(&self) -> u64 {
        self.count + self.children.iter().map(TreeNode::subtree_count).sum::<u64>()
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// Fold category paths into a tree, counting one arrival per path.
pub fn build_category_tree<I, S>(paths: I) -> TreeNode
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut root = TreeNode::root();
    for path in paths {
        root.insert_path(path.as_ref(), true);
    }
    root
}

/// Fold package paths into a tree without counting.
pub fn build_package_tree<I, S>(paths: I) -> TreeNode
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut root = TreeNode::root();
    for path in paths {
        root.insert_path(path.as_ref(), false);
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(node: &TreeNode) -> Vec<&str> {
        node.children.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn test_reinsertion_reuses_chain() {
        let tree = build_category_tree(["A/B", "A/B"]);

        assert_eq!(labels(&tree), vec!["A"]);
        let a = tree.child("A").unwrap();
        assert_eq!(labels(a), vec!["B"]);
        assert_eq!(a.child("B").unwrap().count, 2);
        assert_eq!(a.count, 0);
    }

    #[test]
    fn test_add_child_is_idempotent() {
        let mut root = TreeNode::root();
        root.add_child("x");
        root.add_child("y");
        root.add_child("x").count = 5;

        assert_eq!(labels(&root), vec!["x", "y"]);
        assert_eq!(root.child("x").unwrap().count, 5);
    }

    #[test]
    fn test_siblings_stay_unique_for_any_order() {
        let orders = [
            vec!["a/b", "a/c", "a/b", "d"],
            vec!["d", "a/b", "a/b", "a/c"],
            vec!["a/c", "d", "a/b", "a/c"],
        ];

        for order in orders {
            let tree = build_category_tree(&order);
            let mut top = labels(&tree);
            top.sort_unstable();
            top.dedup();
            assert_eq!(top.len(), tree.children.len());

            let a = tree.child("a").unwrap();
            let mut second = labels(a);
            let before = second.len();
            second.sort_unstable();
            second.dedup();
            assert_eq!(second.len(), before);
        }
    }

    #[test]
    fn test_leading_slash_is_ignored() {
        assert_eq!(
            build_category_tree(["/dev/doc"]),
            build_category_tree(["dev/doc"])
        );
        assert_eq!(
            build_package_tree(["//dev//doc/"]),
            build_package_tree(["dev/doc"])
        );
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let tree = build_category_tree(["Zeta", "Alpha", "Mid/One", "Alpha/Two"]);
        assert_eq!(labels(&tree), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_category_tree_two_roots() {
        let tree = build_category_tree(["DevOps/GitLab", "Search/Engine"]);

        assert_eq!(tree.label, "root");
        assert_eq!(labels(&tree), vec!["DevOps", "Search"]);

        let devops = tree.child("DevOps").unwrap();
        assert_eq!(labels(devops), vec!["GitLab"]);
        assert_eq!(devops.child("GitLab").unwrap().count, 1);

        let search = tree.child("Search").unwrap();
        assert_eq!(labels(search), vec!["Engine"]);
        assert_eq!(search.child("Engine").unwrap().count, 1);

        assert_eq!(tree.subtree_count(), 2);
    }

    #[test]
    fn test_package_tree_has_no_counts() {
        let tree = build_package_tree(["/dev/doc/gitlab", "/dev/doc/wiki"]);
        assert_eq!(tree.subtree_count(), 0);
        assert_eq!(tree.descendant_count(), 4);
    }

    #[test]
    fn test_empty_path_is_skipped() {
        let tree = build_category_tree(["", "/", "//"]);
        assert!(tree.children.is_empty());
        assert_eq!(tree.count, 0);
    }

    #[test]
    fn test_serialized_shape() {
        let tree = build_category_tree(["DevOps/GitLab"]);
        let json = serde_json::to_value(&tree).unwrap();

        assert_eq!(json["name"], "root");
        assert!(json.get("count").is_none());
        assert_eq!(json["children"][0]["children"][0]["name"], "GitLab");
        assert_eq!(json["children"][0]["children"][0]["count"], 1);
        assert!(json["children"][0]["children"][0].get("children").is_none());
    }

    #[test]
    fn test_deserializes_key_alias() {
        let node: TreeNode =
            serde_yaml::from_str("key: dev\nchildren:\n  - key: doc\n").unwrap();
        assert_eq!(node.label, "dev");
        assert_eq!(node.children[0].label, "doc");
    }
}
