//! Wiring of a webhook endpoint into a producer, a channel and a consumer.

use std::sync::Arc;

use tether_access::{FunctionOptions, QueueResource, ResourceAccessDeclaration};
use tether_compute::{Assembler, ComputeUnit, FunctionDefinition, TetherComputeError};
use tether_platform::{ChannelHandle, ChannelProvider, ChannelSpec, RoleHandle};
use tracing::{info, instrument};

use crate::{
    TetherWebhookError, WebhookCallback, WebhookChannelOptions, WebhookConsumer, WebhookProducer,
};

/// Entry point of the built-in producer handler.
pub const PRODUCER_HANDLER: &str = "tether/webhook.produce";

/// Actions the producer is granted on the channel.
pub const PRODUCER_ACTIONS: [&str; 1] = ["sqs:SendMessage"];

/// Actions the consumer is granted on the channel.
pub const CONSUMER_ACTIONS: [&str; 4] = [
    "sqs:ReceiveMessage",
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
    "sqs:ChangeMessageVisibility",
];

/// A webhook endpoint as written by the application author.
#[derive(Clone)]
pub struct WebhookEndpoint {
    /// Logical name; also names the channel.
    pub name: String,
    /// Entry point of the business handler, run by the consumer.
    pub handler: String,
    /// The business logic itself.
    pub callback: Arc<dyn WebhookCallback>,
    /// Resources the business handler needs.
    pub resources: Vec<ResourceAccessDeclaration>,
    /// Overrides of the deployment's options, applied to both sides.
    pub options: FunctionOptions,
    /// Role the consumer runs under instead of creating one.
    pub role: Option<RoleHandle>,
}

impl WebhookEndpoint {
    /// Define the endpoint `name` whose requests `callback` processes.
    pub fn new(
        name: impl Into<String>,
        handler: impl Into<String>,
        callback: Arc<dyn WebhookCallback>,
    ) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            callback,
            resources: Vec::new(),
            options: FunctionOptions::default(),
            role: None,
        }
    }

    /// Grant the business handler access to a resource.
    pub fn with_access(mut self, declaration: ResourceAccessDeclaration) -> Self {
        self.resources.push(declaration);
        self
    }

    /// Override the deployment's options.
    pub fn with_options(mut self, options: FunctionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the consumer under an existing role.
    pub fn with_role(mut self, role: RoleHandle) -> Self {
        self.role = Some(role);
        self
    }
}

/// What a relay is built with.
#[derive(Clone)]
pub struct RelayContext {
    /// Assembles the producer and consumer units.
    pub assembler: Assembler,
    /// Provides the channel between them.
    pub channels: Arc<dyn ChannelProvider>,
}

/// Fail unless both sides time out after exactly the visibility window.
pub fn check_timeouts(
    producer: u32,
    consumer: u32,
    visibility: u32,
) -> Result<(), TetherWebhookError> {
    if producer == visibility && consumer == visibility {
        Ok(())
    } else {
        Err(TetherWebhookError::TimeoutMismatch {
            producer,
            consumer,
            visibility,
        })
    }
}

/// A provisioned webhook relay.
pub struct WebhookRelay {
    producer_unit: ComputeUnit,
    consumer_unit: ComputeUnit,
    channel: ChannelHandle,
    producer: WebhookProducer,
    consumer: Arc<WebhookConsumer>,
}

impl WebhookRelay {
    /// Provision the channel, assemble both compute units and subscribe the
    /// consumer.
    ///
    /// Options are checked and both units compiled before anything is
    /// provisioned. Re-running after a failure is safe: channels and roles
    /// are created idempotently by name.
    #[instrument(skip_all, fields(endpoint = %endpoint.name))]
    pub async fn create(
        endpoint: WebhookEndpoint,
        options: &WebhookChannelOptions,
        context: &RelayContext,
    ) -> Result<Self, TetherWebhookError> {
        options.validate()?;
        let visibility = options.visibility_window_seconds;
        if let Some(timeout) = endpoint.options.timeout_seconds {
            check_timeouts(visibility, timeout, visibility)?;
        }

        let resources = context.assembler.options().context();
        let mut queue = if options.ordering {
            QueueResource::fifo(&endpoint.name, &resources)
        } else {
            QueueResource::new(&endpoint.name, &resources)
        };

        let (producer_definition, consumer_definition) =
            definitions(&endpoint, &queue, visibility);
        context.assembler.compile(&producer_definition)?;
        context
            .assembler
            .compile(&consumer_definition)
            .map_err(|failure| attribute(failure, &endpoint.name))?;

        let channel = context
            .channels
            .create_channel(&ChannelSpec {
                name: queue.runtime_name.clone(),
                fifo: options.ordering,
                content_dedup: options.ordering,
                visibility_window_seconds: visibility,
            })
            .await?;
        queue.arn = channel.arn.clone();
        queue.url = Some(channel.url.clone());

        let (producer_definition, consumer_definition) =
            definitions(&endpoint, &queue, visibility);
        let producer_unit = context.assembler.assemble(&producer_definition).await?;
        let consumer_unit = context
            .assembler
            .assemble(&consumer_definition)
            .await
            .map_err(|failure| attribute(failure, &endpoint.name))?;
        check_timeouts(
            producer_unit.timeout_seconds,
            consumer_unit.timeout_seconds,
            channel.visibility_window_seconds,
        )?;

        let producer = WebhookProducer::new(
            context.channels.clone(),
            channel.clone(),
            options.ordering,
            options.group_id.clone(),
            producer_unit.timeout_seconds,
        );
        let consumer = Arc::new(WebhookConsumer::new(
            endpoint.callback,
            consumer_unit.timeout_seconds,
        ));
        context
            .channels
            .on_batch(&channel, consumer.clone(), options.batch())
            .await?;

        info!(
            channel = %channel.name,
            producer = %producer_unit.function_name,
            consumer = %consumer_unit.function_name,
            "Created webhook relay"
        );
        Ok(Self {
            producer_unit,
            consumer_unit,
            channel,
            producer,
            consumer,
        })
    }

    /// The public, enqueue-only unit.
    pub fn producer_unit(&self) -> &ComputeUnit {
        &self.producer_unit
    }

    /// The worker unit running the business handler.
    pub fn consumer_unit(&self) -> &ComputeUnit {
        &self.consumer_unit
    }

    /// The channel shared by both units.
    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Runtime side of the producer unit.
    pub fn producer(&self) -> &WebhookProducer {
        &self.producer
    }

    /// Runtime side of the consumer unit.
    pub fn consumer(&self) -> &WebhookConsumer {
        &self.consumer
    }
}

/// Producer and consumer definitions over `queue`. The endpoint's own
/// declarations come first so their positions match the author's.
fn definitions(
    endpoint: &WebhookEndpoint,
    queue: &QueueResource,
    visibility: u32,
) -> (FunctionDefinition, FunctionDefinition) {
    let unit_options = FunctionOptions {
        timeout_seconds: Some(visibility),
        ..endpoint.options.clone()
    };

    let producer = FunctionDefinition::new(format!("{}Producer", endpoint.name), PRODUCER_HANDLER)
        .with_access(ResourceAccessDeclaration::queue(
            queue.clone(),
            PRODUCER_ACTIONS,
        ))
        .with_options(unit_options.clone());

    let mut consumer =
        FunctionDefinition::new(format!("{}Consumer", endpoint.name), &endpoint.handler)
            .with_options(unit_options);
    consumer.resources = endpoint.resources.clone();
    consumer.resources.push(ResourceAccessDeclaration::queue(
        queue.clone(),
        CONSUMER_ACTIONS,
    ));
    consumer.role = endpoint.role.clone();

    (producer, consumer)
}

/// Report a consumer compile failure against the endpoint the author wrote.
fn attribute(failure: TetherComputeError, endpoint: &str) -> TetherWebhookError {
    match failure {
        TetherComputeError::Access(access) => {
            TetherWebhookError::Access(access.for_unit(endpoint))
        }
        TetherComputeError::InvalidDefinition { reason, .. } => {
            TetherComputeError::InvalidDefinition {
                unit: endpoint.to_string(),
                reason,
            }
            .into()
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_aligned_timeouts() {
        assert_eq!(check_timeouts(30, 30, 30), Ok(()));
    }

    #[test]
    fn it_rejects_either_side_diverging() {
        assert_eq!(
            check_timeouts(30, 60, 30),
            Err(TetherWebhookError::TimeoutMismatch {
                producer: 30,
                consumer: 60,
                visibility: 30
            })
        );
        assert!(check_timeouts(10, 30, 30).is_err());
    }
}
