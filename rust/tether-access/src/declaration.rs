//! Resource-access declarations.
//!
//! A [`ResourceAccessDeclaration`] pairs exactly one [`ResourceAccess`]
//! payload with the ordered set of actions the compute unit needs on it.
//! Declarations are immutable once built.
//!
//! The serialized form is a loose object with one optional key per resource
//! kind, which is how declarations appear in configuration documents:
//!
//! ```json
//! { "table": { ... }, "actions": ["dynamodb:GetItem"] }
//! ```
//!
//! Exactly one kind key must be present; anything else is rejected when the
//! declaration is constructed.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::TetherAccessError;
use crate::resource::{
    EncryptionKeyResource, NotificationResource, QueueResource, SecretResource, TableResource,
    TopicResource,
};

/// The resource a declaration grants access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAccess {
    /// A data table.
    Table(TableResource),
    /// A publish/subscribe topic.
    Topic(TopicResource),
    /// A message queue.
    Queue(QueueResource),
    /// A push-notification platform application.
    Notification(NotificationResource),
    /// A stored secret.
    Secret(SecretResource),
    /// An encryption key.
    EncryptionKey(EncryptionKeyResource),
    /// Caller-supplied ARNs, granted verbatim.
    RawArn(Vec<String>),
}

/// Discriminant of [`ResourceAccess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// See [`ResourceAccess::Table`].
    Table,
    /// See [`ResourceAccess::Topic`].
    Topic,
    /// See [`ResourceAccess::Queue`].
    Queue,
    /// See [`ResourceAccess::Notification`].
    Notification,
    /// See [`ResourceAccess::Secret`].
    Secret,
    /// See [`ResourceAccess::EncryptionKey`].
    EncryptionKey,
    /// See [`ResourceAccess::RawArn`].
    RawArn,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Table => "table",
            ResourceKind::Topic => "topic",
            ResourceKind::Queue => "queue",
            ResourceKind::Notification => "notification",
            ResourceKind::Secret => "secret",
            ResourceKind::EncryptionKey => "encryptionKey",
            ResourceKind::RawArn => "rawArn",
        };
        write!(f, "{name}")
    }
}

impl ResourceAccess {
    /// Which kind of resource this is.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceAccess::Table(_) => ResourceKind::Table,
            ResourceAccess::Topic(_) => ResourceKind::Topic,
            ResourceAccess::Queue(_) => ResourceKind::Queue,
            ResourceAccess::Notification(_) => ResourceKind::Notification,
            ResourceAccess::Secret(_) => ResourceKind::Secret,
            ResourceAccess::EncryptionKey(_) => ResourceKind::EncryptionKey,
            ResourceAccess::RawArn(_) => ResourceKind::RawArn,
        }
    }
}

/// A request by a compute unit for specific actions on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LooseDeclaration", into = "LooseDeclaration")]
pub struct ResourceAccessDeclaration {
    resource: ResourceAccess,
    actions: Vec<String>,
}

impl ResourceAccessDeclaration {
    /// Declare `actions` on `resource`. Repeated actions collapse onto their
    /// first occurrence.
    ///
    /// An empty action list is accepted here and rejected by the compiler,
    /// which knows the compute unit and position to report.
    pub fn new<A>(resource: ResourceAccess, actions: impl IntoIterator<Item = A>) -> Self
    where
        A: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for action in actions {
            let action = action.into();
            if !ordered.contains(&action) {
                ordered.push(action);
            }
        }
        Self {
            resource,
            actions: ordered,
        }
    }

    /// Declare access to a table.
    pub fn table<A: Into<String>>(table: TableResource, actions: impl IntoIterator<Item = A>) -> Self {
        Self::new(ResourceAccess::Table(table), actions)
    }

    /// Declare access to a topic.
    pub fn topic<A: Into<String>>(topic: TopicResource, actions: impl IntoIterator<Item = A>) -> Self {
        Self::new(ResourceAccess::Topic(topic), actions)
    }

    /// Declare access to a queue.
    pub fn queue<A: Into<String>>(queue: QueueResource, actions: impl IntoIterator<Item = A>) -> Self {
        Self::new(ResourceAccess::Queue(queue), actions)
    }

    /// Declare access to a push-notification platform application.
    pub fn notification<A: Into<String>>(
        notification: NotificationResource,
        actions: impl IntoIterator<Item = A>,
    ) -> Self {
        Self::new(ResourceAccess::Notification(notification), actions)
    }

    /// Declare access to a secret.
    pub fn secret<A: Into<String>>(secret: SecretResource, actions: impl IntoIterator<Item = A>) -> Self {
        Self::new(ResourceAccess::Secret(secret), actions)
    }

    /// Declare access to an encryption key.
    pub fn encryption_key<A: Into<String>>(
        key: EncryptionKeyResource,
        actions: impl IntoIterator<Item = A>,
    ) -> Self {
        Self::new(ResourceAccess::EncryptionKey(key), actions)
    }

    /// Declare access to arbitrary ARNs.
    pub fn raw_arn<A: Into<String>>(
        arns: impl IntoIterator<Item = impl Into<String>>,
        actions: impl IntoIterator<Item = A>,
    ) -> Self {
        Self::new(
            ResourceAccess::RawArn(arns.into_iter().map(Into::into).collect()),
            actions,
        )
    }

    /// The resource being accessed.
    pub fn resource(&self) -> &ResourceAccess {
        &self.resource
    }

    /// Requested actions, in declaration order.
    pub fn actions(&self) -> &[String] {
        &self.actions
    }
}

/// Parse a JSON list of declarations for the compute unit `unit`.
///
/// A malformed entry is reported as
/// [`TetherAccessError::MalformedResourceAccess`] with its position.
pub fn parse_declarations(
    unit: &str,
    json: &str,
) -> Result<Vec<ResourceAccessDeclaration>, TetherAccessError> {
    let entries: Vec<LooseDeclaration> = serde_json::from_str(json)
        .map_err(|e| TetherAccessError::InvalidDeclaration(e.to_string()))?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            ResourceAccessDeclaration::try_from(entry).map_err(|error| {
                TetherAccessError::MalformedResourceAccess {
                    unit: unit.to_string(),
                    index,
                    reason: error.to_string(),
                }
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LooseDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table: Option<TableResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<TopicResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    queue: Option<QueueResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notification: Option<NotificationResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<SecretResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encryption_key: Option<EncryptionKeyResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_arn: Option<Vec<String>>,
    #[serde(default)]
    actions: Vec<String>,
}

impl TryFrom<LooseDeclaration> for ResourceAccessDeclaration {
    type Error = TetherAccessError;

    fn try_from(loose: LooseDeclaration) -> Result<Self, Self::Error> {
        let LooseDeclaration {
            table,
            topic,
            queue,
            notification,
            secret,
            encryption_key,
            raw_arn,
            actions,
        } = loose;

        let mut candidates = [
            table.map(ResourceAccess::Table),
            topic.map(ResourceAccess::Topic),
            queue.map(ResourceAccess::Queue),
            notification.map(ResourceAccess::Notification),
            secret.map(ResourceAccess::Secret),
            encryption_key.map(ResourceAccess::EncryptionKey),
            raw_arn.map(ResourceAccess::RawArn),
        ]
        .into_iter()
        .flatten();

        match (candidates.next(), candidates.next()) {
            (Some(resource), None) => Ok(Self::new(resource, actions)),
            (None, _) => Err(TetherAccessError::InvalidDeclaration(
                "no resource was specified".into(),
            )),
            (Some(first), Some(second)) => Err(TetherAccessError::InvalidDeclaration(format!(
                "more than one resource was specified ({} and {})",
                first.kind(),
                second.kind()
            ))),
        }
    }
}

impl From<ResourceAccessDeclaration> for LooseDeclaration {
    fn from(declaration: ResourceAccessDeclaration) -> Self {
        let mut loose = LooseDeclaration {
            actions: declaration.actions,
            ..Default::default()
        };
        match declaration.resource {
            ResourceAccess::Table(table) => loose.table = Some(table),
            ResourceAccess::Topic(topic) => loose.topic = Some(topic),
            ResourceAccess::Queue(queue) => loose.queue = Some(queue),
            ResourceAccess::Notification(notification) => loose.notification = Some(notification),
            ResourceAccess::Secret(secret) => loose.secret = Some(secret),
            ResourceAccess::EncryptionKey(key) => loose.encryption_key = Some(key),
            ResourceAccess::RawArn(arns) => loose.raw_arn = Some(arns),
        }
        loose
    }
}
