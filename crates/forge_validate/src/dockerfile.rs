//! Container-recipe validator.

use std::sync::OnceLock;

use regex::Regex;

use crate::report::ValidationReport;

const REQUIRED_INSTRUCTIONS: &[(&str, &str)] =
    &[("FROM", "base-image"), ("WORKDIR", "working-directory"), ("COPY", "file-copy")];

const FORBIDDEN_TOKENS: &[&str] = &["PLACEHOLDER", "TODO", "FIXME", "XXX"];

fn secret_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r#"(?i)(password|secret|key|token)\s*=\s*['"][^'"]+['"]"#).unwrap(),
            Regex::new(r"(?i)AWS_SECRET_ACCESS_KEY\s*=").unwrap(),
            Regex::new(r"(?i)AWS_ACCESS_KEY_ID\s*=").unwrap(),
            Regex::new(r"AKIA[0-9A-Z]{16}").unwrap(),
            Regex::new(r"(?i)GITHUB_TOKEN\s*=").unwrap(),
        ]
    })
}

/// Validates a Dockerfile's content against the fixed rule set.
pub fn validate_dockerfile(content: &str) -> ValidationReport {
    let mut report = ValidationReport::new();
    let upper = content.to_uppercase();

    for (instruction, label) in REQUIRED_INSTRUCTIONS {
        if !content.contains(instruction) {
            report.error(format!("Dockerfile missing required instruction: {label} ({instruction})"));
        }
    }
    if !content.contains("CMD") && !content.contains("ENTRYPOINT") {
        report.error("Dockerfile missing required instruction: entrypoint (CMD or ENTRYPOINT)");
    }

    for token in FORBIDDEN_TOKENS {
        if upper.contains(token) {
            report.error(format!("Dockerfile contains placeholder: {token}"));
        }
    }

    for pattern in secret_patterns() {
        if pattern.is_match(content) {
            report.error(format!("Dockerfile contains a hardcoded secret matching pattern: {}", pattern.as_str()));
        }
    }

    if content.contains(":latest") {
        report.warn("image tag 'latest' is mutable, pin a specific version");
    }
    if !content.contains("HEALTHCHECK") {
        report.warn("no HEALTHCHECK instruction found");
    }
    if !content.contains("USER ") {
        report.warn("no USER switch found, container will run as root");
    }
    if !content.to_lowercase().contains(" as ") {
        report.warn("not a multi-stage build, image is likely larger than necessary");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_dockerfile() -> &'static str {
        r#"FROM node:20-slim AS builder
WORKDIR /app
COPY . .
RUN npm ci && npm run build

FROM node:20-slim
WORKDIR /app
COPY --from=builder /app/dist ./dist
USER node
HEALTHCHECK CMD curl -f http://localhost:3000/health || exit 1
CMD ["node", "dist/index.js"]
"#
    }

    #[test]
    fn well_formed_recipe_has_no_errors_or_warnings() {
        let report = validate_dockerfile(valid_dockerfile());
        assert!(report.valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_required_instructions_are_hard_errors() {
        let report = validate_dockerfile("FROM node:20\n");
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("working-directory")));
        assert!(report.errors.iter().any(|e| e.contains("file-copy")));
        assert!(report.errors.iter().any(|e| e.contains("entrypoint")));
    }

    #[test]
    fn placeholder_tokens_are_hard_errors() {
        let report = validate_dockerfile("FROM node:20\nWORKDIR /app\nCOPY . .\nCMD [\"node\", \"index.js\"] # TODO finish this\n");
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("TODO")));
    }

    #[test]
    fn hardcoded_secret_is_a_hard_error() {
        let content = "FROM node:20\nWORKDIR /app\nCOPY . .\nENV password=\"hunter2\"\nCMD [\"node\"]\n";
        let report = validate_dockerfile(content);
        assert!(!report.valid);
    }

    #[test]
    fn best_practice_gaps_are_warnings_not_errors() {
        let content = "FROM node:20:latest\nWORKDIR /app\nCOPY . .\nCMD [\"node\"]\n";
        let report = validate_dockerfile(content);
        assert!(report.valid);
        assert!(!report.warnings.is_empty());
    }
}
