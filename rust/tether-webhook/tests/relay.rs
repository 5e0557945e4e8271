//! End-to-end behaviour of a relay on the in-memory platform.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tether_access::{
    FunctionOptions, PermissionStatement, PlatformOptions, ResourceAccessDeclaration,
    TableResource, TetherAccessError, log_write_statement,
};
use tether_compute::{Assembler, RoleBinder};
use tether_platform::{
    BatchHandler, BatchOptions, ChannelHandle, ChannelProvider, ChannelSpec, MemoryPlatform,
    PollOutcome, SendReceipt, TetherPlatformError,
};
use tether_webhook::{
    CONSUMER_ACTIONS, DeliveryState, GroupIdSource, RelayContext, TetherWebhookError,
    WebhookCallback, WebhookChannelOptions, WebhookEndpoint, WebhookRelay, WebhookRequest,
};
use testresult::TestResult;

#[derive(Default)]
struct Recorder {
    bodies: Mutex<Vec<String>>,
    failing: Mutex<Option<String>>,
}

impl Recorder {
    fn failing_on(body: &str) -> Self {
        Self {
            failing: Mutex::new(Some(body.to_string())),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.bodies.lock().len()
    }

    fn recover(&self) {
        *self.failing.lock() = None;
    }
}

#[async_trait]
impl WebhookCallback for Recorder {
    async fn call(&self, request: WebhookRequest) -> anyhow::Result<()> {
        self.bodies.lock().push(request.body.clone());
        if self.failing.lock().as_deref() == Some(request.body.as_str()) {
            anyhow::bail!("could not process {}", request.body);
        }
        Ok(())
    }
}

fn context(platform: &MemoryPlatform) -> RelayContext {
    RelayContext {
        assembler: Assembler::new(
            PlatformOptions::default(),
            RoleBinder::new(Arc::new(platform.clone())),
        ),
        channels: Arc::new(platform.clone()),
    }
}

fn unknown_channel(name: &str) -> ChannelHandle {
    ChannelHandle {
        name: name.into(),
        url: String::new(),
        arn: String::new(),
        visibility_window_seconds: 30,
    }
}

/// Accepts channels but never acknowledges a send.
struct StalledChannels;

#[async_trait]
impl ChannelProvider for StalledChannels {
    async fn create_channel(
        &self,
        spec: &ChannelSpec,
    ) -> Result<ChannelHandle, TetherPlatformError> {
        Ok(ChannelHandle {
            name: spec.name.clone(),
            url: format!("memory://{}", spec.name),
            arn: format!("arn:aws:sqs:us-east-1:000000000000:{}", spec.name),
            visibility_window_seconds: spec.visibility_window_seconds,
        })
    }

    async fn send(
        &self,
        _channel: &ChannelHandle,
        _body: &str,
        _group_id: Option<&str>,
    ) -> Result<SendReceipt, TetherPlatformError> {
        std::future::pending().await
    }

    async fn on_batch(
        &self,
        _channel: &ChannelHandle,
        _handler: Arc<dyn BatchHandler>,
        _options: BatchOptions,
    ) -> Result<(), TetherPlatformError> {
        Ok(())
    }
}

fn ordered_by(field: &str) -> WebhookChannelOptions {
    WebhookChannelOptions {
        group_id: GroupIdSource::Field(field.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn it_delivers_duplicate_submissions_once() -> TestResult {
    let platform = MemoryPlatform::default();
    let recorder = Arc::new(Recorder::default());
    let endpoint = WebhookEndpoint::new("orders", "src/orders.handle", recorder.clone());
    let relay = WebhookRelay::create(endpoint, &ordered_by("orderId"), &context(&platform)).await?;

    let payload = r#"{"orderId":"42","amount":5}"#;
    let first = relay.producer().enqueue(&WebhookRequest::new(payload)).await?;
    let second = relay.producer().enqueue(&WebhookRequest::new(payload)).await?;

    assert_eq!(first.group_id.as_deref(), Some("42"));
    assert_eq!(first.state, DeliveryState::Enqueued);
    assert!(second.duplicate);
    assert_eq!(second.message_id, first.message_id);
    assert_eq!(recorder.calls(), 0);

    assert_eq!(
        platform.drain(relay.channel()).await?,
        vec![PollOutcome::Acknowledged { records: 1 }]
    );
    assert_eq!(*recorder.bodies.lock(), vec![payload.to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn it_redelivers_the_whole_batch_when_one_record_fails() -> TestResult {
    let platform = MemoryPlatform::default();
    let recorder = Arc::new(Recorder::failing_on("2"));
    let endpoint = WebhookEndpoint::new("orders", "src/orders.handle", recorder.clone());
    let relay = WebhookRelay::create(
        endpoint,
        &WebhookChannelOptions::default(),
        &context(&platform),
    )
    .await?;

    for body in ["1", "2", "3"] {
        relay.producer().enqueue(&WebhookRequest::new(body)).await?;
    }

    let outcome = platform.poll(relay.channel()).await?;
    assert!(matches!(outcome, PollOutcome::Failed { records: 3, .. }));
    assert_eq!(recorder.calls(), 3);
    assert_eq!(platform.in_flight(relay.channel())?, 3);
    assert_eq!(platform.poll(relay.channel()).await?, PollOutcome::Idle);

    recorder.recover();
    tokio::time::advance(Duration::from_secs(30)).await;

    assert_eq!(
        platform.poll(relay.channel()).await?,
        PollOutcome::Acknowledged { records: 3 }
    );
    assert_eq!(recorder.calls(), 6);
    assert_eq!(platform.depth(relay.channel())?, 0);
    Ok(())
}

#[tokio::test]
async fn it_refuses_a_consumer_timeout_other_than_the_visibility_window() -> TestResult {
    let platform = MemoryPlatform::default();
    let endpoint = WebhookEndpoint::new(
        "orders",
        "src/orders.handle",
        Arc::new(Recorder::default()),
    )
    .with_options(FunctionOptions {
        timeout_seconds: Some(60),
        ..Default::default()
    });

    let result = WebhookRelay::create(
        endpoint,
        &WebhookChannelOptions::default(),
        &context(&platform),
    )
    .await;

    assert_eq!(
        result.err(),
        Some(TetherWebhookError::TimeoutMismatch {
            producer: 30,
            consumer: 60,
            visibility: 30,
        })
    );
    assert_eq!(platform.role_count(), 0);
    assert_eq!(
        platform.depth(&unknown_channel("orders-dev.fifo")),
        Err(TetherPlatformError::UnknownChannel("orders-dev.fifo".into()))
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_answers_bad_request_when_the_group_field_is_missing() -> TestResult {
    let platform = MemoryPlatform::default();
    let endpoint = WebhookEndpoint::new(
        "orders",
        "src/orders.handle",
        Arc::new(Recorder::default()),
    );
    let relay = WebhookRelay::create(endpoint, &ordered_by("orderId"), &context(&platform)).await?;

    let response = relay
        .producer()
        .handle(WebhookRequest::new(r#"{"amount":5}"#))
        .await;

    assert_eq!(response.status, 400);
    assert!(response.body.contains("orderId"));
    assert_eq!(platform.depth(relay.channel())?, 0);

    let accepted = relay
        .producer()
        .handle(WebhookRequest::new(r#"{"orderId":7}"#))
        .await;
    assert_eq!(accepted.status, 200);
    assert!(accepted.body.contains("messageId"));
    assert_eq!(platform.depth(relay.channel())?, 1);
    Ok(())
}

#[tokio::test]
async fn it_compiles_each_side_with_its_own_access() -> TestResult {
    let platform = MemoryPlatform::default();
    let options = PlatformOptions::default();
    let audit = TableResource::new("audit", &options.context());
    let endpoint = WebhookEndpoint::new(
        "orders",
        "src/orders.handle",
        Arc::new(Recorder::default()),
    )
    .with_access(ResourceAccessDeclaration::table(
        audit.clone(),
        ["dynamodb:PutItem"],
    ));

    let relay = WebhookRelay::create(
        endpoint,
        &WebhookChannelOptions::default(),
        &context(&platform),
    )
    .await?;
    let channel = relay.channel();
    assert_eq!(channel.name, "orders-dev.fifo");

    let producer = relay.producer_unit();
    assert_eq!(producer.function_name, "orders-producer-dev");
    assert_eq!(producer.timeout_seconds, 30);
    assert_eq!(producer.environment["ORDERS_QUEUE_URL"], channel.url);
    assert!(!producer.environment.contains_key("AUDIT_TABLE_NAME"));
    assert_eq!(
        producer.role.policy.as_ref().map(|policy| policy.statements().to_vec()),
        Some(vec![
            log_write_statement(),
            PermissionStatement::allow(["sqs:SendMessage"], [channel.arn.clone()]),
        ])
    );

    let consumer = relay.consumer_unit();
    assert_eq!(consumer.function_name, "orders-consumer-dev");
    assert_eq!(consumer.handler, "src/orders.handle");
    assert_eq!(consumer.timeout_seconds, 30);
    assert_eq!(consumer.environment["AUDIT_TABLE_NAME"], "audit-dev");
    assert_eq!(
        consumer.role.policy.as_ref().map(|policy| policy.statements().to_vec()),
        Some(vec![
            log_write_statement(),
            PermissionStatement::allow(["dynamodb:PutItem"], [audit.arn.clone()]),
            PermissionStatement::allow(CONSUMER_ACTIONS, [channel.arn.clone()]),
        ])
    );
    assert_eq!(platform.role_count(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn it_fails_batches_that_outlive_the_visibility_window() -> TestResult {
    let platform = MemoryPlatform::default();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let endpoint = WebhookEndpoint::new(
        "slow",
        "src/slow.handle",
        Arc::new(move |_: WebhookRequest| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                flag.store(true, Ordering::SeqCst);
                anyhow::Ok(())
            }
        }),
    );
    let relay = WebhookRelay::create(
        endpoint,
        &WebhookChannelOptions::default(),
        &context(&platform),
    )
    .await?;
    assert_eq!(relay.consumer().timeout_seconds(), 30);

    relay.producer().enqueue(&WebhookRequest::new("{}")).await?;
    let outcome = platform.poll(relay.channel()).await?;

    assert!(matches!(outcome, PollOutcome::Failed { records: 1, .. }));
    assert!(!finished.load(Ordering::SeqCst));
    assert_eq!(platform.depth(relay.channel())?, 1);
    Ok(())
}

#[tokio::test]
async fn it_sends_without_groups_when_ordering_is_off() -> TestResult {
    let platform = MemoryPlatform::default();
    let recorder = Arc::new(Recorder::default());
    let endpoint = WebhookEndpoint::new("events", "src/events.handle", recorder.clone());
    let options = WebhookChannelOptions {
        ordering: false,
        group_id: GroupIdSource::Field("missing".into()),
        ..Default::default()
    };
    let relay = WebhookRelay::create(endpoint, &options, &context(&platform)).await?;

    assert_eq!(relay.channel().name, "events-dev");
    let first = relay.producer().enqueue(&WebhookRequest::new("same")).await?;
    let second = relay.producer().enqueue(&WebhookRequest::new("same")).await?;

    assert_eq!(first.group_id, None);
    assert!(!second.duplicate);
    platform.drain(relay.channel()).await?;
    assert_eq!(recorder.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn it_provisions_nothing_when_an_endpoint_declaration_is_invalid() -> TestResult {
    let platform = MemoryPlatform::default();
    let options = PlatformOptions::default();
    let audit = TableResource::new("audit", &options.context());
    let endpoint = WebhookEndpoint::new(
        "orders",
        "src/orders.handle",
        Arc::new(Recorder::default()),
    )
    .with_access(ResourceAccessDeclaration::table(
        audit.clone(),
        Vec::<String>::new(),
    ));

    let result = WebhookRelay::create(
        endpoint,
        &WebhookChannelOptions::default(),
        &context(&platform),
    )
    .await;

    assert_eq!(
        result.err(),
        Some(TetherWebhookError::Access(
            TetherAccessError::EmptyAccessGrant {
                unit: "orders".into(),
                index: 0,
            }
        ))
    );
    assert_eq!(platform.role_count(), 0);
    assert_eq!(
        platform.depth(&unknown_channel("orders-dev.fifo")),
        Err(TetherPlatformError::UnknownChannel("orders-dev.fifo".into()))
    );

    let fixed = WebhookEndpoint::new(
        "orders",
        "src/orders.handle",
        Arc::new(Recorder::default()),
    )
    .with_access(ResourceAccessDeclaration::table(audit, ["dynamodb:PutItem"]));
    WebhookRelay::create(fixed, &WebhookChannelOptions::default(), &context(&platform)).await?;
    assert_eq!(platform.role_count(), 2);
    Ok(())
}

#[tokio::test]
async fn it_recreates_a_relay_after_a_failed_attachment() -> TestResult {
    let platform = MemoryPlatform::default();
    let endpoint = || {
        WebhookEndpoint::new(
            "orders",
            "src/orders.handle",
            Arc::new(Recorder::default()),
        )
    };

    platform.reject_policies("throttled");
    let failed = WebhookRelay::create(
        endpoint(),
        &WebhookChannelOptions::default(),
        &context(&platform),
    )
    .await;
    assert!(matches!(
        failed.err(),
        Some(TetherWebhookError::Compute(_))
    ));

    platform.accept_policies();
    let relay = WebhookRelay::create(
        endpoint(),
        &WebhookChannelOptions::default(),
        &context(&platform),
    )
    .await?;

    assert_eq!(relay.channel().name, "orders-dev.fifo");
    assert_eq!(platform.role_count(), 2);
    for role in ["orders-producer-dev", "orders-consumer-dev"] {
        assert_eq!(platform.role(role).expect("role exists").policies.len(), 1);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn it_answers_server_error_when_the_channel_does_not_accept_in_time() -> TestResult {
    let platform = MemoryPlatform::default();
    let context = RelayContext {
        channels: Arc::new(StalledChannels),
        ..context(&platform)
    };
    let endpoint = WebhookEndpoint::new(
        "orders",
        "src/orders.handle",
        Arc::new(Recorder::default()),
    );
    let relay = WebhookRelay::create(endpoint, &WebhookChannelOptions::default(), &context).await?;

    let enqueued = relay.producer().enqueue(&WebhookRequest::new("{}")).await;
    assert_eq!(
        enqueued.err(),
        Some(TetherWebhookError::EnqueueTimeout { seconds: 30 })
    );

    let response = relay.producer().handle(WebhookRequest::new("{}")).await;
    assert_eq!(response.status, 500);
    assert!(response.body.contains("30s"));
    Ok(())
}
