use tether_access::TetherAccessError;
use tether_platform::TetherPlatformError;
use thiserror::Error;

/// Errors raised while assembling a compute unit.
#[derive(Debug, Error, PartialEq)]
pub enum TetherComputeError {
    /// The unit's resource access did not compile
    #[error(transparent)]
    Access(#[from] TetherAccessError),

    /// The platform failed to provision the unit's role
    #[error(transparent)]
    Platform(#[from] TetherPlatformError),

    /// The unit definition itself is invalid
    #[error("Invalid compute unit '{unit}': {reason}")]
    InvalidDefinition {
        /// Name of the compute unit.
        unit: String,
        /// What is wrong with it.
        reason: String,
    },
}
