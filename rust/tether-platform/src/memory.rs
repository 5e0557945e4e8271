//! In-memory platform for local runs and tests.
//!
//! [`MemoryPlatform`] keeps roles and channels in process. Channels honour
//! the same contract a hosted FIFO queue does: per-group ordering,
//! content-based deduplication, visibility-window redelivery. Deliveries are
//! driven explicitly with [`MemoryPlatform::poll`] so tests control when a
//! subscriber runs.
//!
//! Clones share state, so the platform can be handed to the binder and the
//! relay while the test keeps a handle for inspection.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tether_access::{DEFAULT_ACCOUNT, DEFAULT_REGION, PolicyDocument};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    BatchHandler, BatchOptions, ChannelHandle, ChannelProvider, ChannelSpec, MAX_BATCH_SIZE,
    RoleHandle, RoleProvisioner, SendReceipt, TetherPlatformError, TrustPolicy,
};

mod channel;
pub use channel::DEDUP_WINDOW;
use channel::{MemoryChannel, Subscription};

/// A role held by the in-memory platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRecord {
    /// The role.
    pub handle: RoleHandle,
    /// Who may assume it.
    pub trust: TrustPolicy,
    /// Attached policies, in attachment order.
    pub policies: Vec<PolicyDocument>,
}

/// Result of one [`MemoryPlatform::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was visible.
    Idle,
    /// A batch was handled and its records removed.
    Acknowledged {
        /// Records in the batch.
        records: usize,
    },
    /// A batch failed; its records reappear after the visibility window.
    Failed {
        /// Records in the batch.
        records: usize,
        /// The handler's error.
        reason: String,
    },
}

#[derive(Default)]
struct PlatformState {
    roles: BTreeMap<String, RoleRecord>,
    channels: BTreeMap<String, MemoryChannel>,
    policy_rejection: Option<String>,
}

/// In-process implementation of [`RoleProvisioner`] and [`ChannelProvider`].
#[derive(Clone)]
pub struct MemoryPlatform {
    region: String,
    account: String,
    state: Arc<Mutex<PlatformState>>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new(DEFAULT_REGION, DEFAULT_ACCOUNT)
    }
}

impl MemoryPlatform {
    /// Create an empty platform for `region` and `account`.
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
            state: Arc::new(Mutex::new(PlatformState::default())),
        }
    }

    /// Look up a role by name.
    pub fn role(&self, name: &str) -> Option<RoleRecord> {
        self.state.lock().roles.get(name).cloned()
    }

    /// Number of roles created so far.
    pub fn role_count(&self) -> usize {
        self.state.lock().roles.len()
    }

    /// Make every later policy attachment fail with `reason`.
    pub fn reject_policies(&self, reason: impl Into<String>) {
        self.state.lock().policy_rejection = Some(reason.into());
    }

    /// Undo [`MemoryPlatform::reject_policies`].
    pub fn accept_policies(&self) {
        self.state.lock().policy_rejection = None;
    }

        /// Records stored on `channel`, delivered or not.
    pub fn depth(&self, channel: &ChannelHandle) -> Result<usize, TetherPlatformError> {
        self.with_channel(channel, |channel| channel.depth())
    }

    /// Records on `channel` delivered but not yet acknowledged.
    pub fn in_flight(&self, channel: &ChannelHandle) -> Result<usize, TetherPlatformError> {
        let now = Instant::now();
        self.with_channel(channel, |channel| channel.in_flight(now))
    }

    /// Deliver one batch from `channel` to its subscriber.
    ///
    /// The batch is acknowledged when the handler succeeds. When it fails
    /// the records stay hidden until the visibility window lapses.
    pub async fn poll(&self, channel: &ChannelHandle) -> Result<PollOutcome, TetherPlatformError> {
        let now = Instant::now();
        let (subscription, records) = {
            let mut state = self.state.lock();
            let stored = state
                .channels
                .get_mut(&channel.name)
                .ok_or_else(|| TetherPlatformError::UnknownChannel(channel.name.clone()))?;
            let Some(subscription) = stored.subscription() else {
                return Err(TetherPlatformError::ChannelProvisioningFailure {
                    channel: channel.name.clone(),
                    reason: "no subscriber is attached".into(),
                });
            };
            let records = stored.receive(subscription.options.max_batch_size, now);
            (subscription, records)
        };

        if records.is_empty() {
            return Ok(PollOutcome::Idle);
        }

        let count = records.len();
        let message_ids: Vec<String> = records
            .iter()
            .map(|record| record.message_id.clone())
            .collect();
        debug!(channel = %channel.name, records = count, "Delivering batch");

        match subscription.handler.handle(records).await {
            Ok(()) => {
                self.with_channel(channel, |stored| stored.acknowledge(&message_ids))?;
                Ok(PollOutcome::Acknowledged { records: count })
            }
            Err(error) => {
                warn!(channel = %channel.name, records = count, %error, "Batch failed");
                Ok(PollOutcome::Failed {
                    records: count,
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Poll `channel` until nothing visible remains.
    pub async fn drain(
        &self,
        channel: &ChannelHandle,
    ) -> Result<Vec<PollOutcome>, TetherPlatformError> {
        let mut outcomes = Vec::new();
        loop {
            match self.poll(channel).await? {
                PollOutcome::Idle => return Ok(outcomes),
                outcome => outcomes.push(outcome),
            }
        }
    }

    fn with_channel<T>(
        &self,
        channel: &ChannelHandle,
        f: impl FnOnce(&mut MemoryChannel) -> T,
    ) -> Result<T, TetherPlatformError> {
        let mut state = self.state.lock();
        state
            .channels
            .get_mut(&channel.name)
            .map(f)
            .ok_or_else(|| TetherPlatformError::UnknownChannel(channel.name.clone()))
    }
}

#[async_trait]
impl RoleProvisioner for MemoryPlatform {
    async fn create_role(
        &self,
        name: &str,
        trust: &TrustPolicy,
    ) -> Result<RoleHandle, TetherPlatformError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.roles.get(name) {
            if existing.trust != *trust {
                return Err(TetherPlatformError::RoleProvisioningFailure {
                    role: name.to_string(),
                    reason: "a role with this name trusts a different principal".into(),
                });
            }
            return Ok(existing.handle.clone());
        }

        let handle = RoleHandle::new(name, format!("arn:aws:iam::{}:role/{name}", self.account));
        state.roles.insert(
            name.to_string(),
            RoleRecord {
                handle: handle.clone(),
                trust: trust.clone(),
                policies: Vec::new(),
            },
        );
        Ok(handle)
    }

    async fn attach_policy(
        &self,
        role: &RoleHandle,
        document: &PolicyDocument,
    ) -> Result<(), TetherPlatformError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.policy_rejection.clone() {
            return Err(TetherPlatformError::RoleProvisioningFailure {
                role: role.name.clone(),
                reason,
            });
        }

        let record = state
            .roles
            .get_mut(&role.name)
            .ok_or_else(|| TetherPlatformError::UnknownRole(role.name.clone()))?;
        if !record.policies.contains(document) {
            record.policies.push(document.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelProvider for MemoryPlatform {
    async fn create_channel(
        &self,
        spec: &ChannelSpec,
    ) -> Result<ChannelHandle, TetherPlatformError> {
        if spec.fifo && !spec.name.ends_with(".fifo") {
            return Err(TetherPlatformError::ChannelProvisioningFailure {
                channel: spec.name.clone(),
                reason: "FIFO channel names must end in '.fifo'".into(),
            });
        }
        if spec.visibility_window_seconds == 0 {
            return Err(TetherPlatformError::ChannelProvisioningFailure {
                channel: spec.name.clone(),
                reason: "the visibility window must be positive".into(),
            });
        }

        let mut state = self.state.lock();
        if let Some(existing) = state.channels.get(&spec.name) {
            return Ok(existing.handle().clone());
        }

        let handle = ChannelHandle {
            name: spec.name.clone(),
            url: format!(
                "https://sqs.{}.amazonaws.com/{}/{}",
                self.region, self.account, spec.name
            ),
            arn: format!("arn:aws:sqs:{}:{}:{}", self.region, self.account, spec.name),
            visibility_window_seconds: spec.visibility_window_seconds,
        };
        state.channels.insert(
            spec.name.clone(),
            MemoryChannel::new(spec.clone(), handle.clone()),
        );
        Ok(handle)
    }

    async fn send(
        &self,
        channel: &ChannelHandle,
        body: &str,
        group_id: Option<&str>,
    ) -> Result<SendReceipt, TetherPlatformError> {
        let now = Instant::now();
        self.with_channel(channel, |stored| stored.send(body, group_id, now))?
    }

    async fn on_batch(
        &self,
        channel: &ChannelHandle,
        handler: Arc<dyn BatchHandler>,
        options: BatchOptions,
    ) -> Result<(), TetherPlatformError> {
        if options.max_batch_size == 0 || options.max_batch_size > MAX_BATCH_SIZE {
            return Err(TetherPlatformError::ChannelProvisioningFailure {
                channel: channel.name.clone(),
                reason: format!("batch size must be between 1 and {MAX_BATCH_SIZE}"),
            });
        }
        self.with_channel(channel, |stored| {
            stored.subscribe(Subscription { handler, options })
        })
    }
}
