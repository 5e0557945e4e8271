use tether_access::TetherAccessError;
use tether_compute::TetherComputeError;
use tether_platform::TetherPlatformError;
use thiserror::Error;

/// Errors raised while creating a webhook relay or enqueueing into it.
#[derive(Debug, Error, PartialEq)]
pub enum TetherWebhookError {
    /// Producer or consumer timeout differs from the channel's visibility
    /// window
    #[error(
        "Timeouts must equal the {visibility}s visibility window (producer: {producer}s, consumer: {consumer}s)"
    )]
    TimeoutMismatch {
        /// Producer-side timeout in seconds.
        producer: u32,
        /// Consumer-side timeout in seconds.
        consumer: u32,
        /// Channel visibility window in seconds.
        visibility: u32,
    },

    /// The ordering group id is read from a body field that is absent
    #[error("Request body has no '{field}' field to order by")]
    MissingGroupIdField {
        /// The configured field.
        field: String,
    },

    /// The channel options cannot be satisfied
    #[error("Invalid channel options: {0}")]
    InvalidChannelOptions(String),

    /// The channel did not accept a write within the timeout
    #[error("Channel did not accept the request within {seconds}s")]
    EnqueueTimeout {
        /// The timeout that lapsed.
        seconds: u32,
    },

    /// A channel record could not be read back into a request
    #[error("Malformed channel record: {0}")]
    MalformedRecord(String),

    /// Compiling resource access failed
    #[error(transparent)]
    Access(#[from] TetherAccessError),

    /// Assembling a compute unit failed
    #[error(transparent)]
    Compute(#[from] TetherComputeError),

    /// The platform failed
    #[error(transparent)]
    Platform(#[from] TetherPlatformError),
}

impl TetherWebhookError {
    /// Whether the error is the caller's fault rather than the platform's.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TetherWebhookError::MissingGroupIdField { .. })
    }
}
