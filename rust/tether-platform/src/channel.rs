//! Queue-like delivery channels.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::TetherPlatformError;

/// Largest batch a channel hands to a subscriber.
pub const MAX_BATCH_SIZE: usize = 10;

/// Parameters a channel is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    /// Channel name.
    pub name: String,
    /// Strict per-group ordering.
    pub fifo: bool,
    /// Collapse identical bodies sent within the deduplication window.
    pub content_dedup: bool,
    /// How long a delivered, unacknowledged record stays hidden.
    pub visibility_window_seconds: u32,
}

/// A provisioned channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelHandle {
    /// Channel name.
    pub name: String,
    /// Channel URL, used to send.
    pub url: String,
    /// Channel ARN, used in permission statements.
    pub arn: String,
    /// Visibility window the channel was created with.
    pub visibility_window_seconds: u32,
}

/// Acknowledgement of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Identifier of the stored record.
    pub message_id: String,
    /// `true` when the body duplicated a recent one and no new record was
    /// stored; `message_id` then names the original record.
    pub duplicate: bool,
}

/// One record delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    /// Record identifier.
    pub message_id: String,
    /// Body exactly as sent.
    pub body: String,
    /// Ordering group, for FIFO channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// How many times this record has been delivered, this delivery included.
    pub receive_count: u32,
}

/// How records are batched for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    /// Most records per batch, at most [`MAX_BATCH_SIZE`].
    pub max_batch_size: usize,
    /// Longest the channel waits to fill a batch.
    pub max_batch_window_seconds: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_BATCH_SIZE,
            max_batch_window_seconds: 0,
        }
    }
}

/// Receives batches of records from a channel.
///
/// Returning an error reports the whole batch as failed: its records stay on
/// the channel and are redelivered once their visibility window lapses.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Process one batch.
    async fn handle(&self, records: Vec<ChannelRecord>) -> anyhow::Result<()>;
}

/// Creates channels, sends to them and subscribes handlers to them.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Create a channel.
    async fn create_channel(&self, spec: &ChannelSpec)
    -> Result<ChannelHandle, TetherPlatformError>;

    /// Send `body` to `channel`, in `group_id` when the channel is FIFO.
    async fn send(
        &self,
        channel: &ChannelHandle,
        body: &str,
        group_id: Option<&str>,
    ) -> Result<SendReceipt, TetherPlatformError>;

    /// Deliver batches from `channel` to `handler`.
    async fn on_batch(
        &self,
        channel: &ChannelHandle,
        handler: Arc<dyn BatchHandler>,
        options: BatchOptions,
    ) -> Result<(), TetherPlatformError>;
}
