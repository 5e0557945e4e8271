//! Platform options shared by every compute unit in a deployment, and the
//! per-unit overrides layered on top of them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::TetherAccessError;

/// Default stage used when none is configured.
pub const DEFAULT_STAGE: &str = "dev";
/// Default region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Placeholder account used when none is configured.
pub const DEFAULT_ACCOUNT: &str = "000000000000";
/// Default handler timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 10;
/// Default handler memory in megabytes.
pub const DEFAULT_MEMORY_MB: u32 = 1024;

/// Network attachment for compute units that must run inside a VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    /// Subnets the unit attaches network interfaces to.
    pub subnet_ids: Vec<String>,
    /// Security groups applied to those interfaces.
    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

/// Deployment-wide options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformOptions {
    /// Environment identifier (`dev`, `prod`, ...).
    pub stage: String,
    /// Region the deployment targets.
    pub region: String,
    /// Account the deployment targets.
    pub account: String,
    /// Whether distributed tracing is enabled.
    pub tracing: bool,
    /// VPC attachment, if any.
    pub vpc: Option<VpcConfig>,
    /// Caller-supplied environment variables.
    pub environment: BTreeMap<String, String>,
    /// Handler timeout in seconds.
    pub timeout_seconds: u32,
    /// Handler memory in megabytes.
    pub memory_mb: u32,
}

impl Default for PlatformOptions {
    fn default() -> Self {
        Self {
            stage: DEFAULT_STAGE.into(),
            region: DEFAULT_REGION.into(),
            account: DEFAULT_ACCOUNT.into(),
            tracing: false,
            vpc: None,
            environment: BTreeMap::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            memory_mb: DEFAULT_MEMORY_MB,
        }
    }
}

/// Per-compute-unit overrides. Unset fields inherit from [`PlatformOptions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionOptions {
    /// Overrides [`PlatformOptions::tracing`].
    pub tracing: Option<bool>,
    /// Overrides [`PlatformOptions::vpc`].
    pub vpc: Option<VpcConfig>,
    /// Merged over [`PlatformOptions::environment`]; these values win.
    pub environment: BTreeMap<String, String>,
    /// Overrides [`PlatformOptions::timeout_seconds`].
    pub timeout_seconds: Option<u32>,
    /// Overrides [`PlatformOptions::memory_mb`].
    pub memory_mb: Option<u32>,
}

impl PlatformOptions {
    /// Parse options from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, TetherAccessError> {
        serde_json::from_str(json).map_err(|e| TetherAccessError::InvalidOptions(e.to_string()))
    }

    /// Read options from `TETHER_STAGE`, `TETHER_REGION`, `TETHER_ACCOUNT`
    /// and `TETHER_TRACING`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, TetherAccessError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TetherAccessError> {
        let mut options = Self::default();
        if let Some(stage) = lookup("TETHER_STAGE") {
            options.stage = stage;
        }
        if let Some(region) = lookup("TETHER_REGION") {
            options.region = region;
        }
        if let Some(account) = lookup("TETHER_ACCOUNT") {
            options.account = account;
        }
        if let Some(tracing) = lookup("TETHER_TRACING") {
            options.tracing = match tracing.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(TetherAccessError::InvalidOptions(format!(
                        "TETHER_TRACING must be a boolean, got '{other}'"
                    )));
                }
            };
        }
        if options.stage.is_empty() {
            return Err(TetherAccessError::InvalidOptions(
                "stage must not be empty".into(),
            ));
        }
        Ok(options)
    }

    /// Layer a compute unit's overrides over these options.
    pub fn effective(&self, overrides: &FunctionOptions) -> PlatformOptions {
        let mut environment = self.environment.clone();
        environment.extend(
            overrides
                .environment
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        PlatformOptions {
            stage: self.stage.clone(),
            region: self.region.clone(),
            account: self.account.clone(),
            tracing: overrides.tracing.unwrap_or(self.tracing),
            vpc: overrides.vpc.clone().or_else(|| self.vpc.clone()),
            environment,
            timeout_seconds: overrides.timeout_seconds.unwrap_or(self.timeout_seconds),
            memory_mb: overrides.memory_mb.unwrap_or(self.memory_mb),
        }
    }

    /// The naming context resources in this deployment are derived from.
    pub fn context(&self) -> ResourceContext {
        ResourceContext {
            stage: self.stage.clone(),
            region: self.region.clone(),
            account: self.account.clone(),
        }
    }
}

/// Stage, region and account used to derive runtime names and ARNs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContext {
    /// Environment identifier.
    pub stage: String,
    /// Target region.
    pub region: String,
    /// Target account.
    pub account: String,
}

impl ResourceContext {
    /// Create a context for the given stage with default region and account.
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            region: DEFAULT_REGION.into(),
            account: DEFAULT_ACCOUNT.into(),
        }
    }

    /// Build an ARN for a resource of `service` in this context.
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{service}:{}:{}:{resource}",
            self.region, self.account
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_layers_function_overrides() {
        let platform = PlatformOptions {
            environment: BTreeMap::from([
                ("LOG_LEVEL".to_string(), "info".to_string()),
                ("REGION_HINT".to_string(), "east".to_string()),
            ]),
            ..Default::default()
        };
        let overrides = FunctionOptions {
            tracing: Some(true),
            timeout_seconds: Some(30),
            environment: BTreeMap::from([("LOG_LEVEL".to_string(), "debug".to_string())]),
            ..Default::default()
        };

        let effective = platform.effective(&overrides);

        assert!(effective.tracing);
        assert_eq!(effective.timeout_seconds, 30);
        assert_eq!(effective.memory_mb, DEFAULT_MEMORY_MB);
        assert_eq!(effective.environment["LOG_LEVEL"], "debug");
        assert_eq!(effective.environment["REGION_HINT"], "east");
    }

    #[test]
    fn it_parses_partial_json() {
        let options =
            PlatformOptions::from_json(r#"{"stage":"prod","tracing":true,"timeoutSeconds":20}"#)
                .unwrap();

        assert_eq!(options.stage, "prod");
        assert!(options.tracing);
        assert_eq!(options.timeout_seconds, 20);
        assert_eq!(options.region, DEFAULT_REGION);
    }

    #[test]
    fn it_rejects_malformed_json() {
        let result = PlatformOptions::from_json(r#"{"stage": 5}"#);
        assert!(matches!(result, Err(TetherAccessError::InvalidOptions(_))));
    }

    #[test]
    fn it_reads_options_from_a_lookup() {
        let options = PlatformOptions::from_lookup(|key| match key {
            "TETHER_STAGE" => Some("staging".into()),
            "TETHER_TRACING" => Some("TRUE".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(options.stage, "staging");
        assert!(options.tracing);
        assert_eq!(options.account, DEFAULT_ACCOUNT);
    }

    #[test]
    fn it_rejects_non_boolean_tracing() {
        let result = PlatformOptions::from_lookup(|key| match key {
            "TETHER_TRACING" => Some("sometimes".into()),
            _ => None,
        });
        assert!(matches!(result, Err(TetherAccessError::InvalidOptions(_))));
    }

    #[test]
    fn it_formats_arns() {
        let context = ResourceContext::new("dev");
        assert_eq!(
            context.arn("dynamodb", "table/todos-dev"),
            "arn:aws:dynamodb:us-east-1:000000000000:table/todos-dev"
        );
    }
}
