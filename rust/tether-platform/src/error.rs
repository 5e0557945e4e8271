use thiserror::Error;

/// Failures reported by the provisioning and runtime platform.
///
/// None of these are retried by this workspace; they propagate to whoever
/// drives provisioning.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TetherPlatformError {
    /// A role could not be created, or a policy could not be attached to it
    #[error("Could not provision role '{role}': {reason}")]
    RoleProvisioningFailure {
        /// Name of the role.
        role: String,
        /// Why provisioning failed.
        reason: String,
    },

    /// A channel could not be created or subscribed to
    #[error("Could not provision channel '{channel}': {reason}")]
    ChannelProvisioningFailure {
        /// Name of the channel.
        channel: String,
        /// Why provisioning failed.
        reason: String,
    },

    /// A channel refused a message
    #[error("Channel '{channel}' rejected a message: {reason}")]
    ChannelSendFailure {
        /// Name of the channel.
        channel: String,
        /// Why the message was rejected.
        reason: String,
    },

    /// The channel does not exist
    #[error("Channel '{0}' does not exist")]
    UnknownChannel(String),

    /// The role does not exist
    #[error("Role '{0}' does not exist")]
    UnknownRole(String),
}
