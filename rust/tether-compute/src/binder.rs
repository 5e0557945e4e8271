//! The role/policy binder.
//!
//! A compute unit either runs under a role its author supplies, which is
//! reused verbatim, or under a role created for it here. Created roles get
//! one policy: a baseline log-write statement followed by every compiled
//! statement, in order.
//!
//! Failures from the platform are not retried; provisioning is expected to
//! be re-runnable as a whole.

use std::sync::Arc;

use serde::Serialize;
use tether_access::naming::role_name;
use tether_access::{CompiledAccess, PolicyDocument, log_write_statement};
use tether_platform::{RoleHandle, RoleProvisioner, TrustPolicy};
use tracing::{error, info, instrument};

use crate::TetherComputeError;

/// The identity a compute unit executes as.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRole {
    /// The role.
    pub handle: RoleHandle,
    /// The policy attached by the binder; `None` for reused roles.
    pub policy: Option<PolicyDocument>,
}

impl ExecutionRole {
    /// Whether the role was supplied by the caller rather than created.
    pub fn is_reused(&self) -> bool {
        self.policy.is_none()
    }
}

/// Turns compiled access into execution roles.
#[derive(Clone)]
pub struct RoleBinder {
    provisioner: Arc<dyn RoleProvisioner>,
}

impl RoleBinder {
    /// Create a binder provisioning roles through `provisioner`.
    pub fn new(provisioner: Arc<dyn RoleProvisioner>) -> Self {
        Self { provisioner }
    }

    /// Bind `compiled` for the unit `unit` deployed to `stage`.
    ///
    /// With `existing`, that role is returned untouched and no policy is
    /// attached; the caller owns its permissions.
    #[instrument(skip(self, compiled, existing))]
    pub async fn bind(
        &self,
        unit: &str,
        stage: &str,
        compiled: &CompiledAccess,
        existing: Option<RoleHandle>,
    ) -> Result<ExecutionRole, TetherComputeError> {
        if let Some(handle) = existing {
            info!(role = %handle.name, "Reusing execution role");
            return Ok(ExecutionRole {
                handle,
                policy: None,
            });
        }

        let name = role_name(unit, stage);
        let handle = self
            .provisioner
            .create_role(&name, &TrustPolicy::compute())
            .await?;

        let document = PolicyDocument::new(
            std::iter::once(log_write_statement())
                .chain(compiled.permission_statements.iter().cloned()),
        );
        if let Err(failure) = self.provisioner.attach_policy(&handle, &document).await {
            error!(role = %handle.name, %failure, "Could not attach policy");
            return Err(failure.into());
        }

        info!(
            role = %handle.name,
            statements = document.statements().len(),
            "Created execution role"
        );
        Ok(ExecutionRole {
            handle,
            policy: Some(document),
        })
    }
}
