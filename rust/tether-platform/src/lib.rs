//! The provisioning and runtime platform, as seen by this workspace.
//!
//! Compute units need two things from the platform they are deployed to:
//!
//! - execution roles with policies attached ([`RoleProvisioner`]), and
//! - queue-like channels that can be written to and that deliver batches to
//!   a subscriber ([`ChannelProvider`]).
//!
//! Both are traits so the binder and the webhook relay stay independent of
//! any particular cloud SDK. [`MemoryPlatform`] implements both in process.

mod error;
pub use error::*;

mod role;
pub use role::*;

mod channel;
pub use channel::*;

mod memory;
pub use memory::*;
