//! Validation of bookmark files against the fixed bookmark schema.
//!
//! The schema is: an array of objects, each with non-blank string `name`,
//! `url`, `domain` and `category`; `category` must look like
//! `Parent/Child/Grandchild`; optional `packages` is a list of strings or
//! objects; optional `meta` is an object. Every violation is collected.

use crate::models::{AggregatedDataset, SourceKey, ValidationReport};
use regex::Regex;
use serde_yaml::{Mapping, Value};

/// Pattern every category must match.
pub const CATEGORY_PATTERN: &str = r"^[^/]+(/[^/]+)*$";

const REQUIRED: [&str; 4] = ["name", "url", "domain", "category"];

/// Validator for the bookmark schema.
pub struct SchemaValidator {
    category: Regex,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            category: Regex::new(CATEGORY_PATTERN).expect("category pattern is a valid regex"),
        }
    }

    /// Validate one file's raw YAML.
    pub fn validate(&self, content: &str, source: &SourceKey) -> ValidationReport {
        let mut violations = Vec::new();

        match serde_yaml::from_str::<Value>(content) {
            Ok(Value::Null) => {}
            Ok(Value::Sequence(items)) => {
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::Mapping(map) => self.check_bookmark(index, map, &mut violations),
                        _ => violations.push(format!("#/{}: expected an object", index)),
                    }
                }
            }
            Ok(_) => violations.push("#: expected an array of bookmarks".to_string()),
            Err(e) => violations.push(format!("#: invalid YAML: {}", e)),
        }

        ValidationReport {
            source: source.clone(),
            violations,
        }
    }

    /// Validate every file. One file's violations never hide another's.
    pub fn validate_all(&self, dataset: &AggregatedDataset) -> Vec<ValidationReport> {
        dataset
            .iter()
            .map(|(source, content)| self.validate(content, source))
            .collect()
    }

    fn check_bookmark(&self, index: usize, map: &Mapping, violations: &mut Vec<String>) {
        for field in REQUIRED {
            match map.get(field) {
                None | Some(Value::Null) => violations.push(format!(
                    "#/{}: required property '{}' is missing",
                    index, field
                )),
                Some(Value::String(s)) if s.trim().is_empty() => {
                    violations.push(format!("#/{}/{}: must not be blank", index, field))
                }
                Some(Value::String(s)) if field == "category" && !self.category.is_match(s) => {
                    violations.push(format!(
                        "#/{}/category: '{}' does not match pattern {}",
                        index, s, CATEGORY_PATTERN
                    ))
                }
                Some(Value::String(_)) => {}
                Some(_) => violations.push(format!("#/{}/{}: expected a string", index, field)),
            }
        }

        match map.get("packages") {
            None | Some(Value::Null) => {}
            Some(Value::Sequence(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if !matches!(item, Value::String(_) | Value::Mapping(_)) {
                        violations.push(format!(
                            "#/{}/packages/{}: expected a string or an object",
                            index, i
                        ));
                    }
                }
            }
            Some(_) => violations.push(format!("#/{}/packages: expected an array", index)),
        }

        match map.get("meta") {
            None | Some(Value::Null) | Some(Value::Mapping(_)) => {}
            Some(_) => violations.push(format!("#/{}/meta: expected an object", index)),
        }
    }
}

/// Reports that contain at least one violation.
pub fn failed_reports(reports: &[ValidationReport]) -> Vec<ValidationReport> {
    reports.iter().filter(|r| !r.is_valid()).cloned().collect()
}

/// Human-readable summary of failed reports, one block per file.
pub fn describe(reports: &[ValidationReport]) -> String {
    let mut text = String::new();
    for report in reports.iter().filter(|r| !r.is_valid()) {
        text.push_str(&format!("Schema validation failed for {}:\n", report.source));
        for violation in &report.violations {
            text.push_str(&format!("- {}\n", violation));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str) -> SourceKey {
        SourceKey::new("team/links", path)
    }

    #[test]
    fn test_valid_file_has_no_violations() {
        let yaml = r#"
- name: GitLab
  url: https://gitlab.com
  domain: gitlab.com
  category: DevOps/GitLab
  packages: ["/dev/doc"]
  meta: {owner: platform}
"#;
        let report = SchemaValidator::new().validate(yaml, &source("a.yml"));
        assert!(report.is_valid(), "{:?}", report.violations);
    }

    #[test]
    fn test_collects_every_violation() {
        let yaml = r#"
- name: GitLab
  domain: gitlab.com
  category: /DevOps
- url: https://x
  name: ""
  domain: 12
  category: Ok
"#;
        let report = SchemaValidator::new().validate(yaml, &source("a.yml"));

        assert_eq!(
            report.violations,
            vec![
                "#/0: required property 'url' is missing".to_string(),
                format!("#/0/category: '/DevOps' does not match pattern {}", CATEGORY_PATTERN),
                "#/1/name: must not be blank".to_string(),
                "#/1/domain: expected a string".to_string(),
            ]
        );
    }

    #[test]
    fn test_category_pattern() {
        let validator = SchemaValidator::new();
        assert!(validator.category.is_match("A"));
        assert!(validator.category.is_match("A/B/C"));
        assert!(!validator.category.is_match("A//B"));
        assert!(!validator.category.is_match("A/"));
        assert!(!validator.category.is_match(""));
    }

    #[test]
    fn test_root_must_be_array() {
        let report = SchemaValidator::new().validate("name: x", &source("a.yml"));
        assert_eq!(report.violations, vec!["#: expected an array of bookmarks"]);

        let report = SchemaValidator::new().validate("[1]", &source("a.yml"));
        assert_eq!(report.violations, vec!["#/0: expected an object"]);
    }

    #[test]
    fn test_malformed_yaml_is_a_violation() {
        let report = SchemaValidator::new().validate("- name: [", &source("a.yml"));
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].starts_with("#: invalid YAML"));
    }

    #[test]
    fn test_batch_reports_all_files() {
        let mut dataset = AggregatedDataset::new();
        dataset.insert(source("a.yml"), "- {name: A}".to_string());
        dataset.insert(
            source("b.yml"),
            "- {name: B, url: u, domain: d, category: C}".to_string(),
        );
        dataset.insert(source("c.yml"), "- {url: u}".to_string());

        let reports = SchemaValidator::new().validate_all(&dataset);
        assert_eq!(reports.len(), 3);

        let failed = failed_reports(&reports);
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].source, source("a.yml"));
        assert_eq!(failed[1].source, source("c.yml"));

        let text = describe(&reports);
        assert!(text.contains("Schema validation failed for team/links:a.yml"));
        assert!(text.contains("Schema validation failed for team/links:c.yml"));
        assert!(!text.contains("b.yml"));
    }

    #[test]
    fn test_packages_and_meta_shapes() {
        let yaml = r#"
- name: A
  url: u
  domain: d
  category: C
  packages: [1]
  meta: [x]
"#;
        let report = SchemaValidator::new().validate(yaml, &source("a.yml"));
        assert_eq!(
            report.violations,
            vec![
                "#/0/packages/0: expected a string or an object",
                "#/0/meta: expected an object",
            ]
        );
    }
}
