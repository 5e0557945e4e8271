//! Compute-unit definitions and their assembly into deployable units.

use std::collections::BTreeMap;

use serde::Serialize;
use tether_access::naming::runtime_name;
use tether_access::{
    CompiledAccess, FunctionOptions, PlatformOptions, ResourceAccessDeclaration, VpcConfig,
    compile_access,
};
use tether_platform::RoleHandle;
use tracing::instrument;

use crate::{ExecutionRole, RoleBinder, TetherComputeError};

/// A handler as written by the application author.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// Logical name, unique within the deployment.
    pub name: String,
    /// Entry point of the handler code.
    pub handler: String,
    /// Resources the handler needs.
    pub resources: Vec<ResourceAccessDeclaration>,
    /// Overrides of the deployment's options.
    pub options: FunctionOptions,
    /// Role to run under instead of creating one.
    pub role: Option<RoleHandle>,
}

impl FunctionDefinition {
    /// Define the handler `name` served by `handler`.
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            resources: Vec::new(),
            options: FunctionOptions::default(),
            role: None,
        }
    }

    /// Grant the handler access to a resource.
    pub fn with_access(mut self, declaration: ResourceAccessDeclaration) -> Self {
        self.resources.push(declaration);
        self
    }

    /// Override the deployment's options for this handler.
    pub fn with_options(mut self, options: FunctionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run under an existing role.
    pub fn with_role(mut self, role: RoleHandle) -> Self {
        self.role = Some(role);
        self
    }
}

/// A fully wired handler, ready to hand to the deployment tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeUnit {
    /// Logical name.
    pub name: String,
    /// Stage-qualified deployed name.
    pub function_name: String,
    /// Entry point of the handler code.
    pub handler: String,
    /// Handler timeout in seconds.
    pub timeout_seconds: u32,
    /// Handler memory in megabytes.
    pub memory_mb: u32,
    /// Whether distributed tracing is active.
    pub tracing: bool,
    /// VPC attachment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc: Option<VpcConfig>,
    /// Environment the handler runs with.
    pub environment: BTreeMap<String, String>,
    /// Identity the handler runs as.
    pub role: ExecutionRole,
}

/// Assembles [`FunctionDefinition`]s under one set of deployment options.
#[derive(Clone)]
pub struct Assembler {
    options: PlatformOptions,
    binder: RoleBinder,
}

impl Assembler {
    /// Create an assembler for a deployment.
    pub fn new(options: PlatformOptions, binder: RoleBinder) -> Self {
        Self { options, binder }
    }

    /// The deployment-wide options.
    pub fn options(&self) -> &PlatformOptions {
        &self.options
    }

    /// Validate the definition and compile its resource access without
    /// provisioning anything.
    pub fn compile(
        &self,
        definition: &FunctionDefinition,
    ) -> Result<CompiledAccess, TetherComputeError> {
        self.prepare(definition).map(|(_, compiled)| compiled)
    }

    /// Compile the definition's resource access, bind its role and produce
    /// the deployable unit. Nothing is returned unless every step succeeds.
    #[instrument(skip(self, definition), fields(unit = %definition.name))]
    pub async fn assemble(
        &self,
        definition: &FunctionDefinition,
    ) -> Result<ComputeUnit, TetherComputeError> {
        let (effective, compiled) = self.prepare(definition)?;
        let role = self
            .binder
            .bind(
                &definition.name,
                &effective.stage,
                &compiled,
                definition.role.clone(),
            )
            .await?;

        Ok(ComputeUnit {
            name: definition.name.clone(),
            function_name: runtime_name(&definition.name, &effective.stage),
            handler: definition.handler.clone(),
            timeout_seconds: effective.timeout_seconds,
            memory_mb: effective.memory_mb,
            tracing: effective.tracing,
            vpc: effective.vpc,
            environment: compiled.environment_variables,
            role,
        })
    }

    fn prepare(
        &self,
        definition: &FunctionDefinition,
    ) -> Result<(PlatformOptions, CompiledAccess), TetherComputeError> {
        let invalid = |reason: &str| TetherComputeError::InvalidDefinition {
            unit: definition.name.clone(),
            reason: reason.into(),
        };
        if definition.name.trim().is_empty() {
            return Err(invalid("the name is empty"));
        }
        if definition.handler.trim().is_empty() {
            return Err(invalid("the handler is empty"));
        }

        let effective = self.options.effective(&definition.options);
        if effective.timeout_seconds == 0 {
            return Err(invalid("the timeout must be positive"));
        }

        let compiled = compile_access(&definition.name, &definition.resources, &effective)?;
        Ok((effective, compiled))
    }
}
