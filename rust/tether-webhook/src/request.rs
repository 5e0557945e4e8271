//! Requests crossing the relay, and the producer's responses.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::TetherWebhookError;

/// An inbound webhook request.
///
/// Only the body crosses the channel. It is wrapped verbatim so identical
/// submissions produce identical records and deduplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRequest {
    /// Raw request body.
    pub body: String,
}

impl WebhookRequest {
    /// Wrap a raw body.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Serialize into the record body sent over the channel.
    pub fn to_envelope(&self) -> Result<String, TetherWebhookError> {
        serde_json::to_string(self).map_err(|e| TetherWebhookError::MalformedRecord(e.to_string()))
    }

    /// Read a request back out of a record body.
    pub fn from_envelope(envelope: &str) -> Result<Self, TetherWebhookError> {
        serde_json::from_str(envelope).map_err(|e| TetherWebhookError::MalformedRecord(e.to_string()))
    }
}

/// What the public endpoint answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: String,
}

impl WebhookResponse {
    /// `200` acknowledging the enqueued record.
    pub fn accepted(message_id: &str) -> Self {
        Self {
            status: 200,
            body: json!({ "messageId": message_id }).to_string(),
        }
    }

    /// An error response carrying `error`'s message.
    pub fn error(status: u16, error: &TetherWebhookError) -> Self {
        Self {
            status,
            body: json!({ "error": error.to_string() }).to_string(),
        }
    }
}
