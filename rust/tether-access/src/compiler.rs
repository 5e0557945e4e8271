//! The access compiler.
//!
//! Turns the resource-access declarations of one compute unit into the
//! environment variables its handler reads and the permission statements its
//! execution role needs. Compilation is pure: no resource is touched and the
//! same input always produces the same output.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::resource::NotificationChannel;
use crate::statement::{PermissionStatement, network_interface_statement, tracing_write_statement};
use crate::{PlatformOptions, ResourceAccess, ResourceAccessDeclaration, TetherAccessError};

/// Environment variable enabling HTTP keep-alive in the handler runtime.
pub const CONNECTION_REUSE_KEY: &str = "AWS_NODEJS_CONNECTION_REUSE_ENABLED";

/// Output of [`compile_access`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledAccess {
    /// Environment variables for the handler.
    pub environment_variables: BTreeMap<String, String>,
    /// Permission statements in declaration order, followed by the VPC and
    /// tracing statements when those are enabled.
    pub permission_statements: Vec<PermissionStatement>,
}

/// Compile the declarations of the compute unit `unit`.
///
/// `options` must be the unit's effective options (see
/// [`PlatformOptions::effective`]). Variables merge with precedence
/// compiler defaults < resource-derived < caller-supplied; among
/// resource-derived variables a later declaration overrides an earlier one.
///
/// Any invalid declaration aborts the whole compilation.
#[instrument(skip(declarations, options), fields(stage = %options.stage))]
pub fn compile_access(
    unit: &str,
    declarations: &[ResourceAccessDeclaration],
    options: &PlatformOptions,
) -> Result<CompiledAccess, TetherAccessError> {
    let mut derived = BTreeMap::new();
    let mut statements = Vec::with_capacity(declarations.len() + 2);

    for (index, declaration) in declarations.iter().enumerate() {
        if declaration.actions().is_empty() {
            return Err(TetherAccessError::EmptyAccessGrant {
                unit: unit.to_string(),
                index,
            });
        }

        debug!(index, kind = %declaration.resource().kind(), "Compiling resource access");

        let target = Target { unit, index };
        let actions = declaration.actions();

        match declaration.resource() {
            ResourceAccess::Table(table) => {
                target.require("table ARN", &table.arn)?;
                statements.push(PermissionStatement::allow(actions, [&table.arn]));
                if !table.indexes.is_empty() {
                    statements.push(PermissionStatement::allow(
                        actions,
                        [table.index_wildcard()],
                    ));
                }
                derived.insert(
                    table.definition.env_key.clone(),
                    table.runtime_name.clone(),
                );
            }
            ResourceAccess::Topic(topic) => {
                target.require("topic ARN", &topic.arn)?;
                statements.push(PermissionStatement::allow(actions, [&topic.arn]));
                derived.insert(topic.definition.env_key.clone(), topic.arn.clone());
            }
            ResourceAccess::Queue(queue) => {
                target.require("queue ARN", &queue.arn)?;
                statements.push(PermissionStatement::allow(actions, [&queue.arn]));
                derived.insert(
                    queue.definition.env_key.clone(),
                    queue.runtime_reference().to_string(),
                );
            }
            ResourceAccess::Notification(notification) => {
                if notification.channel != NotificationChannel::Gcm {
                    return Err(TetherAccessError::UnsupportedNotificationChannel {
                        unit: unit.to_string(),
                        index,
                        channel: notification.channel.to_string(),
                    });
                }
                target.require("platform application ARN", &notification.arn)?;
                statements.push(PermissionStatement::allow(actions, [&notification.arn]));
                derived.insert(
                    notification.definition.env_key.clone(),
                    notification.arn.clone(),
                );
            }
            ResourceAccess::Secret(secret) => {
                target.require("secret ARN", &secret.arn)?;
                statements.push(PermissionStatement::allow(actions, [&secret.arn]));
                derived.insert(
                    secret.definition.env_key.clone(),
                    secret.runtime_name.clone(),
                );
            }
            ResourceAccess::EncryptionKey(key) => {
                target.require("key ARN", &key.arn)?;
                statements.push(PermissionStatement::allow(actions, [&key.arn]));
                if let Some(definition) = &key.definition {
                    derived.insert(definition.env_key.clone(), key.arn.clone());
                }
            }
            ResourceAccess::RawArn(arns) => {
                if arns.is_empty() {
                    return Err(target.malformed("no ARN was given"));
                }
                for arn in arns {
                    target.require("ARN", arn)?;
                }
                statements.push(PermissionStatement::allow(actions, arns));
            }
        }
    }

    if options.vpc.is_some() {
        statements.push(network_interface_statement());
    }
    if options.tracing {
        statements.push(tracing_write_statement());
    }

    let mut environment_variables =
        BTreeMap::from([(CONNECTION_REUSE_KEY.to_string(), "1".to_string())]);
    environment_variables.extend(derived);
    environment_variables.extend(
        options
            .environment
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    info!(
        statements = statements.len(),
        variables = environment_variables.len(),
        "Compiled resource access"
    );

    Ok(CompiledAccess {
        environment_variables,
        permission_statements: statements,
    })
}

struct Target<'a> {
    unit: &'a str,
    index: usize,
}

impl Target<'_> {
    fn malformed(&self, reason: impl Into<String>) -> TetherAccessError {
        TetherAccessError::MalformedResourceAccess {
            unit: self.unit.to_string(),
            index: self.index,
            reason: reason.into(),
        }
    }

    fn require(&self, what: &str, value: &str) -> Result<(), TetherAccessError> {
        if value.trim().is_empty() {
            Err(self.malformed(format!("{what} is empty")))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        EncryptionKeyResource, NotificationResource, QueueResource, ResourceContext,
        SecretResource, TableResource, TopicResource, VpcConfig,
    };
    use pretty_assertions::assert_eq;

    fn context() -> ResourceContext {
        ResourceContext::new("dev")
    }

    #[test]
    fn it_compiles_a_single_table_read() {
        let declarations = [ResourceAccessDeclaration::table(
            TableResource::new("todos", &context()),
            ["read-item"],
        )];

        let compiled =
            compile_access("get-todos", &declarations, &PlatformOptions::default()).unwrap();

        assert_eq!(
            compiled.environment_variables,
            BTreeMap::from([
                ("TODOS_TABLE_NAME".to_string(), "todos-dev".to_string()),
                (CONNECTION_REUSE_KEY.to_string(), "1".to_string()),
            ])
        );
        assert_eq!(
            compiled.permission_statements,
            vec![PermissionStatement::allow(
                ["read-item"],
                ["arn:aws:dynamodb:us-east-1:000000000000:table/todos-dev"],
            )]
        );
    }

    #[test]
    fn it_widens_table_grants_to_cover_indexes() {
        for count in 1..=3 {
            let mut table = TableResource::new("todos", &context());
            for n in 0..count {
                table = table.with_index(format!("index{n}"));
            }
            let declarations = [ResourceAccessDeclaration::table(table, ["dynamodb:Query"])];

            let compiled =
                compile_access("query", &declarations, &PlatformOptions::default()).unwrap();

            assert_eq!(compiled.permission_statements.len(), 2);
            assert_eq!(
                compiled.permission_statements[1].resources(),
                ["arn:aws:dynamodb:us-east-1:000000000000:table/todos-dev/index/*"]
            );
        }
    }

    #[test]
    fn it_rejects_empty_grants() {
        let declarations = [
            ResourceAccessDeclaration::topic(TopicResource::new("events", &context()), ["sns:Publish"]),
            ResourceAccessDeclaration::table(
                TableResource::new("todos", &context()),
                Vec::<String>::new(),
            ),
        ];

        let result = compile_access("publish", &declarations, &PlatformOptions::default());

        assert_eq!(
            result,
            Err(TetherAccessError::EmptyAccessGrant {
                unit: "publish".into(),
                index: 1,
            })
        );
    }

    #[test]
    fn it_rejects_non_gcm_notification_channels() {
        let declarations = [ResourceAccessDeclaration::notification(
            NotificationResource::new("push", NotificationChannel::Apns, &context()),
            ["sns:Publish"],
        )];

        let result = compile_access("notify", &declarations, &PlatformOptions::default());

        assert_eq!(
            result,
            Err(TetherAccessError::UnsupportedNotificationChannel {
                unit: "notify".into(),
                index: 0,
                channel: "APNS".into(),
            })
        );
    }

    #[test]
    fn it_publishes_the_gcm_platform_arn() {
        let push = NotificationResource::new("push", NotificationChannel::Gcm, &context());
        let arn = push.arn.clone();
        let declarations = [ResourceAccessDeclaration::notification(push, ["sns:Publish"])];

        let compiled = compile_access("notify", &declarations, &PlatformOptions::default()).unwrap();

        assert_eq!(compiled.environment_variables["PUSH_PLATFORM_ARN"], arn);
    }

    #[test]
    fn it_rejects_raw_arn_grants_without_arns() {
        let declarations = [ResourceAccessDeclaration::raw_arn(
            Vec::<String>::new(),
            ["s3:GetObject"],
        )];

        let result = compile_access("assets", &declarations, &PlatformOptions::default());

        assert!(matches!(
            result,
            Err(TetherAccessError::MalformedResourceAccess { index: 0, .. })
        ));
    }

    #[test]
    fn it_skips_variables_for_keys_without_definitions() {
        let declarations = [
            ResourceAccessDeclaration::encryption_key(
                EncryptionKeyResource::from_arn("arn:aws:kms:us-east-1:000000000000:key/abc"),
                ["kms:Decrypt"],
            ),
            ResourceAccessDeclaration::encryption_key(
                EncryptionKeyResource::new("signing", &context()),
                ["kms:Sign"],
            ),
        ];

        let compiled = compile_access("sign", &declarations, &PlatformOptions::default()).unwrap();

        assert_eq!(compiled.permission_statements.len(), 2);
        assert_eq!(
            compiled.environment_variables.keys().collect::<Vec<_>>(),
            vec![CONNECTION_REUSE_KEY, "SIGNING_KEY_ARN"]
        );
    }

    #[test]
    fn it_publishes_runtime_references_per_kind() {
        let mut queue = QueueResource::new("jobs", &context());
        queue.url = None;
        let declarations = [
            ResourceAccessDeclaration::queue(queue, ["sqs:SendMessage"]),
            ResourceAccessDeclaration::secret(
                SecretResource::new("apiKey", &context()),
                ["secretsmanager:GetSecretValue"],
            ),
            ResourceAccessDeclaration::topic(TopicResource::new("events", &context()), ["sns:Publish"]),
            ResourceAccessDeclaration::raw_arn(
                ["arn:aws:s3:::assets", "arn:aws:s3:::assets/*"],
                ["s3:GetObject"],
            ),
        ];

        let compiled = compile_access("worker", &declarations, &PlatformOptions::default()).unwrap();

        assert_eq!(compiled.environment_variables["JOBS_QUEUE_URL"], "jobs-dev");
        assert_eq!(compiled.environment_variables["API_KEY_SECRET_NAME"], "api-key-dev");
        assert_eq!(
            compiled.environment_variables["EVENTS_TOPIC_ARN"],
            "arn:aws:sns:us-east-1:000000000000:events-dev"
        );
        assert_eq!(compiled.permission_statements.len(), 4);
        assert_eq!(compiled.permission_statements[3].resources().len(), 2);
    }

    #[test]
    fn it_merges_variables_by_precedence() {
        let mut table = TableResource::new("todos", &context());
        table.definition.env_key = CONNECTION_REUSE_KEY.into();
        table.runtime_name = "2".into();
        let mut secret = SecretResource::new("b", &context());
        secret.definition.env_key = "B".into();
        secret.runtime_name = "x".into();
        let declarations = [
            ResourceAccessDeclaration::table(table, ["read-item"]),
            ResourceAccessDeclaration::secret(secret, ["read"]),
        ];

        let derived_only =
            compile_access("merge", &declarations, &PlatformOptions::default()).unwrap();
        assert_eq!(derived_only.environment_variables[CONNECTION_REUSE_KEY], "2");

        let options = PlatformOptions {
            environment: BTreeMap::from([(CONNECTION_REUSE_KEY.to_string(), "3".to_string())]),
            ..Default::default()
        };
        let compiled = compile_access("merge", &declarations, &options).unwrap();

        assert_eq!(
            compiled.environment_variables,
            BTreeMap::from([
                (CONNECTION_REUSE_KEY.to_string(), "3".to_string()),
                ("B".to_string(), "x".to_string()),
            ])
        );
    }

    #[test]
    fn it_lets_later_declarations_override_earlier_variables() {
        let first = TableResource::new("todos", &context());
        let mut second = TableResource::new("todosArchive", &context());
        second.definition.env_key = "TODOS_TABLE_NAME".into();
        let declarations = [
            ResourceAccessDeclaration::table(first, ["read-item"]),
            ResourceAccessDeclaration::table(second, ["read-item"]),
        ];

        let compiled = compile_access("todos", &declarations, &PlatformOptions::default()).unwrap();

        assert_eq!(
            compiled.environment_variables["TODOS_TABLE_NAME"],
            "todos-archive-dev"
        );
    }

    #[test]
    fn it_appends_vpc_and_tracing_statements_once() {
        let options = PlatformOptions {
            tracing: true,
            vpc: Some(VpcConfig {
                subnet_ids: vec!["subnet-1".into()],
                security_group_ids: vec![],
            }),
            ..Default::default()
        };
        let declarations = [
            ResourceAccessDeclaration::topic(TopicResource::new("a", &context()), ["sns:Publish"]),
            ResourceAccessDeclaration::topic(TopicResource::new("b", &context()), ["sns:Publish"]),
        ];

        let compiled = compile_access("fanout", &declarations, &options).unwrap();

        assert_eq!(
            compiled.permission_statements[2..],
            [network_interface_statement(), tracing_write_statement()]
        );
    }

    #[test]
    fn it_is_deterministic() {
        let declarations = [
            ResourceAccessDeclaration::table(
                TableResource::new("todos", &context()).with_index("byOwner"),
                ["dynamodb:GetItem", "dynamodb:Query"],
            ),
            ResourceAccessDeclaration::topic(TopicResource::new("events", &context()), ["sns:Publish"]),
        ];
        let options = PlatformOptions::default();

        let first = compile_access("todos", &declarations, &options).unwrap();
        let second = compile_access("todos", &declarations, &options).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
