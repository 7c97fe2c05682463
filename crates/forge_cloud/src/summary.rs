//! Deployment summary bucketing (§4.8.3, §9A): groups the resources a
//! `terraform apply` created into the fixed display categories, and
//! extracts the public access URL from its output.

use std::sync::OnceLock;

use regex::Regex;

const CATEGORIES: &[(&str, &[&str])] = &[
    ("networking", &["aws_vpc", "aws_subnet", "aws_internet_gateway", "aws_nat_gateway", "aws_route_table", "aws_eip"]),
    ("load-balancing", &["aws_lb", "aws_lb_target_group", "aws_lb_listener"]),
    ("compute", &["aws_ecs_cluster", "aws_ecs_service", "aws_ecs_task_definition", "aws_ecr"]),
    ("security", &["aws_security_group", "aws_iam_role"]),
    ("monitoring", &["aws_cloudwatch"]),
];

#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub category: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub total_resources: usize,
    pub access_url: Option<String>,
    pub groups: Vec<ResourceGroup>,
}

fn resource_line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(aws_[a-zA-Z0-9_]+\.[a-zA-Z0-9_\[\]]+):").unwrap())
}

fn access_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"alb_dns_name\s*=\s*"?([^"\s]+)"?"#).unwrap())
}

fn extract_resources(terraform_output: &str) -> Vec<String> {
    let mut resources = Vec::new();
    for line in terraform_output.lines() {
        let progress_markers = ["Creation complete", "Creating...", "Refreshing state", "Destroying", "Destruction complete"];
        if !progress_markers.iter().any(|m| line.contains(m)) {
            continue;
        }
        if let Some(captures) = resource_line_pattern().captures(line.trim_start()) {
            let resource = captures[1].to_string();
            if !resources.contains(&resource) {
                resources.push(resource);
            }
        }
    }
    resources
}

fn categorize(resources: &[String]) -> Vec<ResourceGroup> {
    let mut groups = Vec::new();
    for (category, prefixes) in CATEGORIES {
        let matched: Vec<String> =
            resources.iter().filter(|r| prefixes.iter().any(|p| r.starts_with(p))).cloned().collect();
        if !matched.is_empty() {
            groups.push(ResourceGroup { category: category.to_string(), resources: matched });
        }
    }
    groups
}

/// Parses a `terraform apply` transcript into a display-ready summary.
pub fn summarize(terraform_output: &str) -> DeploymentSummary {
    let resources = extract_resources(terraform_output);
    let access_url = access_url_pattern().captures(terraform_output).map(|c| c[1].to_string());
    let groups = categorize(&resources);
    DeploymentSummary { total_resources: resources.len(), access_url, groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_resources_into_fixed_categories() {
        let output = "aws_vpc.main: Creation complete after 2s\n\
                       aws_lb.main: Creation complete after 30s\n\
                       aws_ecs_service.main: Creation complete after 10s\n\
                       aws_security_group.alb: Creation complete after 1s\n\
                       aws_cloudwatch_log_group.main: Creation complete after 1s\n";
        let summary = summarize(output);
        assert_eq!(summary.total_resources, 5);
        let categories: Vec<&str> = summary.groups.iter().map(|g| g.category.as_str()).collect();
        assert!(categories.contains(&"networking"));
        assert!(categories.contains(&"load-balancing"));
        assert!(categories.contains(&"compute"));
        assert!(categories.contains(&"security"));
        assert!(categories.contains(&"monitoring"));
    }

    #[test]
    fn extracts_access_url_from_outputs() {
        let output = "Outputs:\n\nalb_dns_name = \"myapp-alb-12345.us-west-2.elb.amazonaws.com\"\n";
        let summary = summarize(output);
        assert_eq!(summary.access_url.as_deref(), Some("myapp-alb-12345.us-west-2.elb.amazonaws.com"));
    }

    #[test]
    fn missing_access_url_is_none_not_a_placeholder() {
        let summary = summarize("no outputs here");
        assert!(summary.access_url.is_none());
    }

    #[test]
    fn deduplicates_repeated_resource_lines() {
        let output = "aws_vpc.main: Creating...\naws_vpc.main: Creation complete after 2s\n";
        let summary = summarize(output);
        assert_eq!(summary.total_resources, 1);
    }
}
