//! The worker side of the relay.
//!
//! Each delivered batch fans out to the callback, one invocation per record,
//! all running concurrently. A failing record does not stop the others, but
//! any failure fails the batch as a whole, and the channel redelivers it
//! once the visibility window lapses. Callbacks must therefore tolerate
//! seeing a record again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tether_platform::{BatchHandler, ChannelRecord};
use tracing::{info, warn};

use crate::{DeliveryState, WebhookRequest};

/// The business logic behind a webhook endpoint.
#[async_trait]
pub trait WebhookCallback: Send + Sync {
    /// Process one request.
    async fn call(&self, request: WebhookRequest) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> WebhookCallback for F
where
    F: Fn(WebhookRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn call(&self, request: WebhookRequest) -> anyhow::Result<()> {
        (self)(request).await
    }
}

/// Outcome of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReport {
    /// Record identifier.
    pub message_id: String,
    /// [`DeliveryState::Processed`] or [`DeliveryState::Failed`].
    pub state: DeliveryState,
    /// The failure, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the channel is told about a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchOutcome {
    /// Every record was processed; the batch is acknowledged.
    Succeeded,
    /// At least one record failed; the whole batch is redelivered.
    Failed,
}

/// Outcome of one batch, records in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Per-record outcomes.
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    /// Records that failed.
    pub fn failures(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.state == DeliveryState::Failed)
            .count()
    }

    /// The batch-level verdict.
    pub fn outcome(&self) -> BatchOutcome {
        if self.failures() == 0 {
            BatchOutcome::Succeeded
        } else {
            BatchOutcome::Failed
        }
    }
}

/// Invokes the callback for every record the channel delivers.
pub struct WebhookConsumer {
    callback: Arc<dyn WebhookCallback>,
    timeout_seconds: u32,
}

impl WebhookConsumer {
    pub(crate) fn new(callback: Arc<dyn WebhookCallback>, timeout_seconds: u32) -> Self {
        Self {
            callback,
            timeout_seconds,
        }
    }

    /// Seconds a batch may take before it counts as failed.
    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds
    }

    /// Invoke the callback for every record concurrently and report each
    /// outcome.
    pub async fn process(&self, records: Vec<ChannelRecord>) -> BatchReport {
        let deliveries = records.into_iter().map(|record| self.deliver(record));
        BatchReport {
            records: join_all(deliveries).await,
        }
    }

    async fn deliver(&self, record: ChannelRecord) -> RecordReport {
        let outcome = match WebhookRequest::from_envelope(&record.body) {
            Ok(request) => self.callback.call(request).await,
            Err(malformed) => Err(malformed.into()),
        };

        match outcome {
            Ok(()) => RecordReport {
                message_id: record.message_id,
                state: DeliveryState::Processed,
                error: None,
            },
            Err(error) => {
                warn!(
                    message_id = %record.message_id,
                    receive_count = record.receive_count,
                    %error,
                    "Webhook callback failed"
                );
                RecordReport {
                    message_id: record.message_id,
                    state: DeliveryState::Failed,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl BatchHandler for WebhookConsumer {
    async fn handle(&self, records: Vec<ChannelRecord>) -> anyhow::Result<()> {
        let count = records.len();
        let timeout = Duration::from_secs(self.timeout_seconds.into());
        let Ok(report) = tokio::time::timeout(timeout, self.process(records)).await else {
            warn!(records = count, seconds = self.timeout_seconds, "Webhook batch timed out");
            anyhow::bail!("batch timed out after {}s", self.timeout_seconds);
        };

        info!(
            records = count,
            failures = report.failures(),
            "Processed webhook batch"
        );
        match report.outcome() {
            BatchOutcome::Succeeded => Ok(()),
            BatchOutcome::Failed => {
                anyhow::bail!("{} of {} records failed", report.failures(), count)
            }
        }
    }
}
