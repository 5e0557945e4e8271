//! Execution roles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tether_access::PolicyDocument;

use crate::TetherPlatformError;

/// Service principal compute units run as.
pub const COMPUTE_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";

/// Who may assume a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    /// Service principal allowed to assume the role.
    pub service: String,
}

impl TrustPolicy {
    /// Trust policy of the compute platform.
    pub fn compute() -> Self {
        Self {
            service: COMPUTE_SERVICE_PRINCIPAL.into(),
        }
    }

    /// Render the trust policy as an assume-role policy document.
    pub fn to_document(&self) -> Value {
        json!({
            "Version": tether_access::POLICY_VERSION,
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "Service": self.service },
                "Action": "sts:AssumeRole",
            }],
        })
    }
}

/// A provisioned execution role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleHandle {
    /// Role name.
    pub name: String,
    /// Role ARN.
    pub arn: String,
}

impl RoleHandle {
    /// Refer to an existing role by name and ARN.
    pub fn new(name: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arn: arn.into(),
        }
    }
}

/// Creates roles and attaches policies to them.
#[async_trait]
pub trait RoleProvisioner: Send + Sync {
    /// Create a role assumable under `trust`.
    ///
    /// A role that already exists under the same trust is returned as is, so
    /// provisioning can be re-run after a partial failure.
    async fn create_role(
        &self,
        name: &str,
        trust: &TrustPolicy,
    ) -> Result<RoleHandle, TetherPlatformError>;

    /// Attach `document` to `role`. Either every statement is attached or
    /// none is. Attaching a document the role already carries is a no-op.
    async fn attach_policy(
        &self,
        role: &RoleHandle,
        document: &PolicyDocument,
    ) -> Result<(), TetherPlatformError>;
}
