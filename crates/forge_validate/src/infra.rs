//! Infra-code validator.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::report::ValidationReport;

const REQUIRED_FILES: &[(&str, &str)] =
    &[("main.tf", "main"), ("variables.tf", "variables"), ("outputs.tf", "outputs"), ("iam.tf", "identity")];

const FORBIDDEN_TOKENS: &[&str] = &["PLACEHOLDER", "TODO", "FIXME", "XXX", "CHANGEME", "REPLACE_ME"];

fn variable_declaration_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"variable\s+"(\w+)""#).unwrap())
}

fn variable_reference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{var\.(\w+)\}").unwrap())
}

fn hardcoded_region_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["'](us|eu|ap|sa|ca|me|af)-(north|south|east|west|central)[a-z0-9-]*-\d["']"#).unwrap())
}

fn first_line_containing(content: &str, token: &str) -> Option<usize> {
    content.lines().position(|line| line.to_uppercase().contains(token)).map(|idx| idx + 1)
}

/// Validates a generated set of Terraform files (filename -> content) against
/// the fixed rule set: required files, placeholder scan, undefined variable
/// references, hardcoded region strings.
pub fn validate_infra_code(files: &HashMap<String, String>) -> ValidationReport {
    let mut report = ValidationReport::new();

    for (filename, label) in REQUIRED_FILES {
        if !files.contains_key(*filename) {
            report.error(format!("missing required file: {label} ({filename})"));
        }
    }

    for (filename, content) in files {
        for token in FORBIDDEN_TOKENS {
            if let Some(line) = first_line_containing(content, token) {
                report.error(format!("Found forbidden term '{token}' in {filename}:{line}"));
            }
        }
    }

    if let Some(variables_content) = files.get("variables.tf") {
        let declared: HashSet<String> =
            variable_declaration_pattern().captures_iter(variables_content).map(|c| c[1].to_string()).collect();

        for (filename, content) in files {
            if filename == "variables.tf" {
                continue;
            }
            let referenced: HashSet<String> =
                variable_reference_pattern().captures_iter(content).map(|c| c[1].to_string()).collect();
            let mut undefined: Vec<&String> = referenced.difference(&declared).collect();
            undefined.sort();
            for name in undefined {
                report.error(format!("{filename} references undefined variable: {name}"));
            }
        }
    }

    for (filename, content) in files {
        if hardcoded_region_pattern().is_match(content) {
            report.warn(format!("{filename} contains a hardcoded region string, prefer var.region"));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_stack() -> HashMap<String, String> {
        let mut files = HashMap::new();
        files.insert("main.tf".to_string(), r#"resource "aws_vpc" "main" { cidr_block = var.vpc_cidr }"#.to_string());
        files.insert("variables.tf".to_string(), r#"variable "vpc_cidr" { type = string }"#.to_string());
        files.insert("outputs.tf".to_string(), r#"output "id" { value = aws_vpc.main.id }"#.to_string());
        files.insert("iam.tf".to_string(), r#"resource "aws_iam_role" "r" { name = "x" }"#.to_string());
        files
    }

    #[test]
    fn complete_stack_is_valid() {
        let report = validate_infra_code(&minimal_stack());
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn missing_file_is_a_hard_error() {
        let mut files = minimal_stack();
        files.remove("outputs.tf");
        let report = validate_infra_code(&files);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("outputs")));
    }

    #[test]
    fn placeholder_token_is_a_hard_error() {
        let mut files = minimal_stack();
        files.insert("main.tf".to_string(), "# TODO fill in resources".to_string());
        let report = validate_infra_code(&files);
        assert!(!report.valid);
    }

    #[test]
    fn undefined_variable_reference_is_a_hard_error() {
        let mut files = minimal_stack();
        files.insert("main.tf".to_string(), r#"resource "aws_vpc" "main" { cidr_block = "${var.undeclared}" }"#.to_string());
        let report = validate_infra_code(&files);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("undeclared")));
    }

    #[test]
    fn hardcoded_region_is_a_warning_not_an_error() {
        let mut files = minimal_stack();
        files.insert("main.tf".to_string(), r#"provider "aws" { region = "us-west-2" }"#.to_string());
        let report = validate_infra_code(&files);
        assert!(report.valid);
        assert!(!report.warnings.is_empty());
    }
}
