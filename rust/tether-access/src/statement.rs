//! Permission statements and the policy documents they are attached as.

use serde::{Deserialize, Serialize};

/// Policy language version emitted in every document.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Whether a statement grants or denies its actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[allow(missing_docs)]
    Allow,
    #[allow(missing_docs)]
    Deny,
}

/// One grant of `actions` on `resources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionStatement {
    effect: Effect,
    #[serde(rename = "Action")]
    actions: Vec<String>,
    #[serde(rename = "Resource")]
    resources: Vec<String>,
}

impl PermissionStatement {
    /// Allow `actions` on every resource in `resources`.
    pub fn allow(
        actions: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    #[allow(missing_docs)]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[allow(missing_docs)]
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    #[allow(missing_docs)]
    pub fn resources(&self) -> &[String] {
        &self.resources
    }
}

/// Log-group writes every created role receives.
pub fn log_write_statement() -> PermissionStatement {
    PermissionStatement::allow(
        [
            "logs:CreateLogGroup",
            "logs:CreateLogStream",
            "logs:PutLogEvents",
        ],
        ["*"],
    )
}

/// Network-interface management required to attach to a VPC.
pub fn network_interface_statement() -> PermissionStatement {
    PermissionStatement::allow(
        [
            "ec2:CreateNetworkInterface",
            "ec2:DescribeNetworkInterfaces",
            "ec2:DeleteNetworkInterface",
            "ec2:AssignPrivateIpAddresses",
            "ec2:UnassignPrivateIpAddresses",
        ],
        ["*"],
    )
}

/// Trace-segment writes required by distributed tracing.
pub fn tracing_write_statement() -> PermissionStatement {
    PermissionStatement::allow(
        ["xray:PutTraceSegments", "xray:PutTelemetryRecords"],
        ["*"],
    )
}

/// An ordered set of statements attached to a role as one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    version: String,
    #[serde(rename = "Statement")]
    statements: Vec<PermissionStatement>,
}

impl PolicyDocument {
    /// Create a document from statements, keeping their order.
    pub fn new(statements: impl IntoIterator<Item = PermissionStatement>) -> Self {
        Self {
            version: POLICY_VERSION.into(),
            statements: statements.into_iter().collect(),
        }
    }

    #[allow(missing_docs)]
    pub fn statements(&self) -> &[PermissionStatement] {
        &self.statements
    }

    /// Render the document as policy JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_renders_policy_json() {
        let document = PolicyDocument::new([PermissionStatement::allow(
            ["sqs:SendMessage"],
            ["arn:aws:sqs:us-east-1:000000000000:jobs-dev"],
        )]);

        assert_eq!(
            document.to_json().unwrap(),
            r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["sqs:SendMessage"],"Resource":["arn:aws:sqs:us-east-1:000000000000:jobs-dev"]}]}"#
        );
    }

    #[test]
    fn it_parses_policy_json() {
        let json = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Deny","Action":["s3:*"],"Resource":["*"]}]}"#;
        let document: PolicyDocument = serde_json::from_str(json).unwrap();

        assert_eq!(document.statements()[0].effect(), Effect::Deny);
        assert_eq!(document.statements()[0].actions(), ["s3:*"]);
    }
}
