//! Channel options of a webhook relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_platform::{BatchOptions, MAX_BATCH_SIZE};

use crate::TetherWebhookError;

/// Default visibility window, and therefore default timeout of both sides.
pub const DEFAULT_VISIBILITY_WINDOW_SECONDS: u32 = 30;

/// Longest a compute unit may run; the visibility window cannot exceed it
/// since both sides time out after exactly that window.
pub const MAX_HANDLER_TIMEOUT_SECONDS: u32 = 900;

/// Ordering group used when none is configured.
pub const DEFAULT_GROUP_ID: &str = "default";

/// Where the ordering group of an inbound request comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupIdSource {
    /// Every request shares this group.
    Fixed(String),
    /// The group is the value of this top-level field of the JSON body.
    Field(String),
}

impl Default for GroupIdSource {
    fn default() -> Self {
        GroupIdSource::Fixed(DEFAULT_GROUP_ID.into())
    }
}

impl GroupIdSource {
    /// Resolve the group of a request body.
    ///
    /// Field values that are not strings are used as their JSON text. A body
    /// that is not a JSON object, or lacks the field, is an error.
    pub fn resolve(&self, body: &str) -> Result<String, TetherWebhookError> {
        let field = match self {
            GroupIdSource::Fixed(group) => return Ok(group.clone()),
            GroupIdSource::Field(field) => field,
        };
        let missing = || TetherWebhookError::MissingGroupIdField {
            field: field.clone(),
        };

        let parsed: Value = serde_json::from_str(body).map_err(|_| missing())?;
        match parsed.get(field) {
            None | Some(Value::Null) => Err(missing()),
            Some(Value::String(group)) => Ok(group.clone()),
            Some(other) => Ok(other.to_string()),
        }
    }
}

/// How the relay's channel is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookChannelOptions {
    /// Visibility window; also the timeout of producer and consumer.
    pub visibility_window_seconds: u32,
    /// Strict per-group ordering with content-based deduplication.
    pub ordering: bool,
    /// Source of the ordering group.
    pub group_id: GroupIdSource,
    /// Most records handed to the consumer at once.
    pub max_batch_size: usize,
    /// Longest the channel waits to fill a batch.
    pub max_batch_window_seconds: u32,
}

impl Default for WebhookChannelOptions {
    fn default() -> Self {
        Self {
            visibility_window_seconds: DEFAULT_VISIBILITY_WINDOW_SECONDS,
            ordering: true,
            group_id: GroupIdSource::default(),
            max_batch_size: MAX_BATCH_SIZE,
            max_batch_window_seconds: 0,
        }
    }
}

impl WebhookChannelOptions {
    /// Check the options can be provisioned.
    pub fn validate(&self) -> Result<(), TetherWebhookError> {
        if self.visibility_window_seconds == 0 {
            return Err(TetherWebhookError::InvalidChannelOptions(
                "the visibility window must be positive".into(),
            ));
        }
        if self.visibility_window_seconds > MAX_HANDLER_TIMEOUT_SECONDS {
            return Err(TetherWebhookError::InvalidChannelOptions(format!(
                "the visibility window cannot exceed the {MAX_HANDLER_TIMEOUT_SECONDS}s handler timeout"
            )));
        }
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(TetherWebhookError::InvalidChannelOptions(format!(
                "the batch size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        let (GroupIdSource::Field(source) | GroupIdSource::Fixed(source)) = &self.group_id;
        if self.ordering && source.is_empty() {
            return Err(TetherWebhookError::InvalidChannelOptions(
                "the group id source is empty".into(),
            ));
        }
        Ok(())
    }

    /// Batching the consumer subscribes with.
    pub fn batch(&self) -> BatchOptions {
        BatchOptions {
            max_batch_size: self.max_batch_size,
            max_batch_window_seconds: self.max_batch_window_seconds,
        }
    }
}
