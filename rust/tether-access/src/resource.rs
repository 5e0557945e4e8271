//! References to provisioned resources that compute units can be granted
//! access to.
//!
//! Each reference carries the identity the permission system knows the
//! resource by (its ARN), the identifier handlers resolve at runtime (name,
//! URL or ARN), and a [`ResourceDefinition`] naming the environment variable
//! the runtime identifier is published under.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::naming::{env_key, runtime_name};
use crate::options::ResourceContext;

/// Logical name of a resource and the environment variable it is exposed as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// Logical name, as written by the application author.
    pub name: String,
    /// Environment-variable key the runtime identifier is published under.
    pub env_key: String,
}

impl ResourceDefinition {
    /// Create a definition with an explicit environment key.
    pub fn new(name: impl Into<String>, env_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env_key: env_key.into(),
        }
    }

    fn derived(name: &str, suffix: &str) -> Self {
        Self::new(name, env_key(name, suffix))
    }
}

/// A secondary index of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    /// Index name.
    pub name: String,
}

/// A key-value data table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResource {
    /// Logical definition.
    pub definition: ResourceDefinition,
    /// Stage-qualified table name.
    pub runtime_name: String,
    /// Table ARN.
    pub arn: String,
    /// Secondary indexes; any index widens grants to `<arn>/index/*`.
    #[serde(default)]
    pub indexes: Vec<SecondaryIndex>,
}

impl TableResource {
    /// Reference the table `name` in the given context.
    pub fn new(name: &str, context: &ResourceContext) -> Self {
        let runtime_name = runtime_name(name, &context.stage);
        Self {
            definition: ResourceDefinition::derived(name, "TABLE_NAME"),
            arn: context.arn("dynamodb", &format!("table/{runtime_name}")),
            runtime_name,
            indexes: Vec::new(),
        }
    }

    /// Add a secondary index.
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(SecondaryIndex { name: name.into() });
        self
    }

    /// Resource pattern covering every index of this table.
    pub fn index_wildcard(&self) -> String {
        format!("{}/index/*", self.arn)
    }
}

/// A publish/subscribe topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResource {
    /// Logical definition.
    pub definition: ResourceDefinition,
    /// Topic ARN.
    pub arn: String,
}

impl TopicResource {
    /// Reference the topic `name` in the given context.
    pub fn new(name: &str, context: &ResourceContext) -> Self {
        Self {
            definition: ResourceDefinition::derived(name, "TOPIC_ARN"),
            arn: context.arn("sns", &runtime_name(name, &context.stage)),
        }
    }
}

/// A message queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResource {
    /// Logical definition.
    pub definition: ResourceDefinition,
    /// Stage-qualified queue name; published when no URL is known.
    pub runtime_name: String,
    /// Queue ARN.
    pub arn: String,
    /// Queue URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl QueueResource {
    /// Reference the queue `name` in the given context.
    pub fn new(name: &str, context: &ResourceContext) -> Self {
        Self::named(name, runtime_name(name, &context.stage), context)
    }

    /// Reference a FIFO queue; the runtime name carries the `.fifo` suffix.
    pub fn fifo(name: &str, context: &ResourceContext) -> Self {
        Self::named(
            name,
            format!("{}.fifo", runtime_name(name, &context.stage)),
            context,
        )
    }

    fn named(name: &str, runtime_name: String, context: &ResourceContext) -> Self {
        Self {
            definition: ResourceDefinition::derived(name, "QUEUE_URL"),
            arn: context.arn("sqs", &runtime_name),
            url: Some(format!(
                "https://sqs.{}.amazonaws.com/{}/{runtime_name}",
                context.region, context.account
            )),
            runtime_name,
        }
    }

    /// The value published to handlers: the URL, or the runtime name when the
    /// URL is unknown.
    pub fn runtime_reference(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.runtime_name)
    }
}

/// Kinds of push-notification platform channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    /// Google Cloud Messaging / Firebase.
    Gcm,
    /// Apple Push Notification service.
    Apns,
    /// Apple Push Notification service sandbox.
    ApnsSandbox,
    /// Amazon Device Messaging.
    Adm,
    /// Baidu Cloud Push.
    Baidu,
}

impl Display for NotificationChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NotificationChannel::Gcm => "GCM",
            NotificationChannel::Apns => "APNS",
            NotificationChannel::ApnsSandbox => "APNS_SANDBOX",
            NotificationChannel::Adm => "ADM",
            NotificationChannel::Baidu => "BAIDU",
        };
        write!(f, "{name}")
    }
}

/// A push-notification platform application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResource {
    /// Logical definition.
    pub definition: ResourceDefinition,
    /// Platform channel kind.
    pub channel: NotificationChannel,
    /// Platform application ARN.
    pub arn: String,
}

impl NotificationResource {
    /// Reference the platform application `name` on `channel`.
    pub fn new(name: &str, channel: NotificationChannel, context: &ResourceContext) -> Self {
        Self {
            definition: ResourceDefinition::derived(name, "PLATFORM_ARN"),
            arn: context.arn(
                "sns",
                &format!("app/{channel}/{}", runtime_name(name, &context.stage)),
            ),
            channel,
        }
    }
}

/// A stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretResource {
    /// Logical definition.
    pub definition: ResourceDefinition,
    /// Stage-qualified secret name.
    pub runtime_name: String,
    /// Secret ARN.
    pub arn: String,
}

impl SecretResource {
    /// Reference the secret `name` in the given context.
    pub fn new(name: &str, context: &ResourceContext) -> Self {
        let runtime_name = runtime_name(name, &context.stage);
        Self {
            definition: ResourceDefinition::derived(name, "SECRET_NAME"),
            arn: context.arn("secretsmanager", &format!("secret:{runtime_name}")),
            runtime_name,
        }
    }
}

/// An encryption key.
///
/// Keys referenced only to widen permissions carry no definition and publish
/// no environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionKeyResource {
    /// Logical definition, if the key is exposed to handlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<ResourceDefinition>,
    /// Key ARN.
    pub arn: String,
}

impl EncryptionKeyResource {
    /// Reference the key aliased `name` in the given context.
    pub fn new(name: &str, context: &ResourceContext) -> Self {
        Self {
            definition: Some(ResourceDefinition::derived(name, "KEY_ARN")),
            arn: context.arn(
                "kms",
                &format!("alias/{}", runtime_name(name, &context.stage)),
            ),
        }
    }

    /// Reference a key by ARN alone.
    pub fn from_arn(arn: impl Into<String>) -> Self {
        Self {
            definition: None,
            arn: arn.into(),
        }
    }
}
