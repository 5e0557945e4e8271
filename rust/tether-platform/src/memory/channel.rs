//! Channel state of the in-memory platform.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;
use ulid::Ulid;

use crate::{
    BatchHandler, BatchOptions, ChannelHandle, ChannelRecord, ChannelSpec, SendReceipt,
    TetherPlatformError,
};

/// How long a content digest suppresses identical bodies.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(300);

struct StoredRecord {
    message_id: String,
    body: String,
    group_id: Option<String>,
    receive_count: u32,
    invisible_until: Option<Instant>,
}

impl StoredRecord {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.is_none_or(|until| until <= now)
    }
}

#[derive(Clone)]
pub(crate) struct Subscription {
    pub handler: Arc<dyn BatchHandler>,
    pub options: BatchOptions,
}

pub(crate) struct MemoryChannel {
    spec: ChannelSpec,
    handle: ChannelHandle,
    records: VecDeque<StoredRecord>,
    digests: HashMap<[u8; 32], (String, Instant)>,
    subscription: Option<Subscription>,
}

impl MemoryChannel {
    pub fn new(spec: ChannelSpec, handle: ChannelHandle) -> Self {
        Self {
            spec,
            handle,
            records: VecDeque::new(),
            digests: HashMap::new(),
            subscription: None,
        }
    }

    pub fn handle(&self) -> &ChannelHandle {
        &self.handle
    }

    pub fn subscription(&self) -> Option<Subscription> {
        self.subscription.clone()
    }

    pub fn subscribe(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    pub fn depth(&self) -> usize {
        self.records.len()
    }

    pub fn in_flight(&self, now: Instant) -> usize {
        self.records
            .iter()
            .filter(|record| !record.is_visible(now))
            .count()
    }

    pub fn send(
        &mut self,
        body: &str,
        group_id: Option<&str>,
        now: Instant,
    ) -> Result<SendReceipt, TetherPlatformError> {
        if self.spec.fifo && group_id.is_none() {
            return Err(TetherPlatformError::ChannelSendFailure {
                channel: self.spec.name.clone(),
                reason: "FIFO channels require a group id".into(),
            });
        }

        let digest: Option<[u8; 32]> = if self.spec.content_dedup {
            self.digests.retain(|_, (_, expires)| *expires > now);
            let digest = Sha256::digest(body.as_bytes()).into();
            if let Some((message_id, _)) = self.digests.get(&digest) {
                return Ok(SendReceipt {
                    message_id: message_id.clone(),
                    duplicate: true,
                });
            }
            Some(digest)
        } else {
            None
        };

        let message_id = Ulid::new().to_string();
        if let Some(digest) = digest {
            self.digests
                .insert(digest, (message_id.clone(), now + DEDUP_WINDOW));
        }
        self.records.push_back(StoredRecord {
            message_id: message_id.clone(),
            body: body.to_string(),
            group_id: group_id.map(str::to_string),
            receive_count: 0,
            invisible_until: None,
        });

        Ok(SendReceipt {
            message_id,
            duplicate: false,
        })
    }

    /// Hide up to `max` visible records for the visibility window and return
    /// them. On FIFO channels a group with a hidden record delivers nothing
    /// until that record is acknowledged or reappears.
    pub fn receive(&mut self, max: usize, now: Instant) -> Vec<ChannelRecord> {
        let window = Duration::from_secs(self.spec.visibility_window_seconds.into());
        let mut blocked: HashSet<String> = HashSet::new();
        let mut batch = Vec::new();

        for record in self.records.iter_mut() {
            if batch.len() >= max {
                break;
            }
            let group = record.group_id.clone().unwrap_or_default();
            if !record.is_visible(now) {
                if self.spec.fifo {
                    blocked.insert(group);
                }
                continue;
            }
            if self.spec.fifo && blocked.contains(&group) {
                continue;
            }

            record.receive_count += 1;
            record.invisible_until = Some(now + window);
            batch.push(ChannelRecord {
                message_id: record.message_id.clone(),
                body: record.body.clone(),
                group_id: record.group_id.clone(),
                receive_count: record.receive_count,
            });
        }

        batch
    }

    pub fn acknowledge(&mut self, message_ids: &[String]) {
        self.records
            .retain(|record| !message_ids.contains(&record.message_id));
    }
}
