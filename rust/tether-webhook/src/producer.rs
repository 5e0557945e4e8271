//! The public, enqueue-only side of the relay.

use std::sync::Arc;
use std::time::Duration;

use tether_platform::{ChannelHandle, ChannelProvider};
use tracing::{debug, error, instrument, warn};

use crate::{
    DeliveryState, GroupIdSource, TetherWebhookError, WebhookRequest, WebhookResponse,
};

/// Receipt of an enqueued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    /// Record identifier on the channel.
    pub message_id: String,
    /// Ordering group the record was sent in.
    pub group_id: Option<String>,
    /// The channel already held an identical record; nothing new was stored.
    pub duplicate: bool,
    /// Always [`DeliveryState::Enqueued`].
    pub state: DeliveryState,
}

/// Pushes inbound requests onto the relay's channel. Never invokes the
/// business callback.
#[derive(Clone)]
pub struct WebhookProducer {
    channels: Arc<dyn ChannelProvider>,
    channel: ChannelHandle,
    ordering: bool,
    group_id: GroupIdSource,
    timeout_seconds: u32,
}

impl WebhookProducer {
    pub(crate) fn new(
        channels: Arc<dyn ChannelProvider>,
        channel: ChannelHandle,
        ordering: bool,
        group_id: GroupIdSource,
        timeout_seconds: u32,
    ) -> Self {
        Self {
            channels,
            channel,
            ordering,
            group_id,
            timeout_seconds,
        }
    }

    /// Seconds the producer waits for the channel to accept a write.
    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds
    }

    /// Enqueue `request`, resolving its ordering group first.
    #[instrument(skip(self, request), fields(channel = %self.channel.name))]
    pub async fn enqueue(&self, request: &WebhookRequest) -> Result<Enqueued, TetherWebhookError> {
        let group_id = if self.ordering {
            Some(self.group_id.resolve(&request.body)?)
        } else {
            None
        };
        let envelope = request.to_envelope()?;

        let send = self
            .channels
            .send(&self.channel, &envelope, group_id.as_deref());
        let receipt = tokio::time::timeout(Duration::from_secs(self.timeout_seconds.into()), send)
            .await
            .map_err(|_| TetherWebhookError::EnqueueTimeout {
                seconds: self.timeout_seconds,
            })??;

        debug!(
            message_id = %receipt.message_id,
            duplicate = receipt.duplicate,
            "Enqueued webhook request"
        );
        Ok(Enqueued {
            message_id: receipt.message_id,
            group_id,
            duplicate: receipt.duplicate,
            state: DeliveryState::Enqueued,
        })
    }

    /// Handle a request the way the public endpoint answers it: `200` once
    /// the channel accepted it, `400` when the caller's body lacks the
    /// ordering field, `500` otherwise.
    pub async fn handle(&self, request: WebhookRequest) -> WebhookResponse {
        match self.enqueue(&request).await {
            Ok(enqueued) => WebhookResponse::accepted(&enqueued.message_id),
            Err(failure) if failure.is_client_error() => {
                warn!(%failure, "Rejected webhook request");
                WebhookResponse::error(400, &failure)
            }
            Err(failure) => {
                error!(%failure, "Could not enqueue webhook request");
                WebhookResponse::error(500, &failure)
            }
        }
    }
}
