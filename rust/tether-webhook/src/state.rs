//! Delivery states of a relayed request.
//!
//! ```text
//! Received ──► Enqueued ──► Delivered ──► Processed
//!                              ▲    │
//!                              │    ▼
//!                              └─ Failed   (redelivered after the
//!                                           visibility window)
//! ```

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Where a relayed request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryState {
    /// The public endpoint accepted the payload.
    Received,
    /// The payload is persisted on the channel.
    Enqueued,
    /// The consumer picked the record up.
    Delivered,
    /// The callback returned successfully.
    Processed,
    /// The callback failed or timed out.
    Failed,
}

impl DeliveryState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Received, Enqueued)
                | (Enqueued, Delivered)
                | (Delivered, Processed)
                | (Delivered, Failed)
                | (Failed, Delivered)
        )
    }

    /// Whether no further transition can follow.
    pub fn is_terminal(self) -> bool {
        self == DeliveryState::Processed
    }
}

impl Display for DeliveryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeliveryState::Received => "received",
            DeliveryState::Enqueued => "enqueued",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Processed => "processed",
            DeliveryState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}
