//! Project record (§4.8.3 scenario 5): the durable, per-project counterpart
//! to a `WorkflowSession` — survives past the CLI process that created it,
//! since `apply` and `destroy` are separate invocations.

use serde::{Deserialize, Serialize};

use crate::summary::DeploymentSummary;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectRecord {
    pub project_id: String,
    pub application_url: Option<String>,
    pub terraform_outputs: Option<String>,
    pub deployment_summary: Option<DeploymentSummaryRecord>,
}

/// `DeploymentSummary` doesn't derive `Serialize`/`Deserialize` itself (it's
/// a display-only type); this is the persisted shape of the same data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSummaryRecord {
    pub total_resources: usize,
    pub access_url: Option<String>,
    pub categories: Vec<String>,
}

impl From<&DeploymentSummary> for DeploymentSummaryRecord {
    fn from(summary: &DeploymentSummary) -> Self {
        Self {
            total_resources: summary.total_resources,
            access_url: summary.access_url.clone(),
            categories: summary.groups.iter().map(|g| g.category.clone()).collect(),
        }
    }
}

impl ProjectRecord {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self { project_id: project_id.into(), ..Default::default() }
    }

    /// Clears the deploy-derived fields back to null, the `destroy` side of
    /// scenario 5.
    pub fn clear_deployment(&mut self) {
        self.application_url = None;
        self.terraform_outputs = None;
        self.deployment_summary = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::ResourceGroup;

    #[test]
    fn fresh_record_has_no_deployment_fields() {
        let record = ProjectRecord::new("acme-widgets");
        assert!(record.application_url.is_none());
        assert!(record.terraform_outputs.is_none());
    }

    #[test]
    fn clear_deployment_nulls_out_a_populated_record() {
        let mut record = ProjectRecord::new("acme-widgets");
        record.application_url = Some("https://example.com".into());
        record.terraform_outputs = Some("{}".into());
        record.deployment_summary = Some(DeploymentSummaryRecord {
            total_resources: 3,
            access_url: Some("https://example.com".into()),
            categories: vec!["compute".into()],
        });
        record.clear_deployment();
        assert!(record.application_url.is_none());
        assert!(record.terraform_outputs.is_none());
        assert!(record.deployment_summary.is_none());
    }

    #[test]
    fn summary_record_mirrors_categories() {
        let summary = DeploymentSummary {
            total_resources: 2,
            access_url: Some("https://example.com".into()),
            groups: vec![ResourceGroup { category: "compute".into(), resources: vec!["aws_ecs_service.main".into()] }],
        };
        let record: DeploymentSummaryRecord = (&summary).into();
        assert_eq!(record.categories, vec!["compute".to_string()]);
    }
}
