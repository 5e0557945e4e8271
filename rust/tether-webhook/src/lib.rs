//! A webhook relay: a public endpoint that only enqueues, and a worker that
//! runs the business callback, joined by one channel.
//!
//! ```text
//!  request ──► WebhookProducer ──► channel (FIFO, dedup) ──► WebhookConsumer ──► callback
//!              200 / 400 / 500      visibility window V       timeout V
//! ```
//!
//! [`WebhookRelay::create`] provisions the channel, assembles a producer and
//! a consumer compute unit through [`tether_compute::Assembler`] and
//! subscribes the consumer. Both units time out after exactly the channel's
//! visibility window; anything else is a [`TetherWebhookError::TimeoutMismatch`].
//!
//! With ordering enabled the channel is FIFO per group and collapses
//! identical bodies sent within its deduplication window. The group comes
//! from [`GroupIdSource`]: a fixed literal, or a field of the JSON body.
//!
//! A batch fails as a whole when any of its records fails, and is then
//! redelivered in full once the visibility window lapses.

mod error;
pub use error::*;

mod options;
pub use options::*;

mod state;
pub use state::*;

mod request;
pub use request::*;

mod producer;
pub use producer::*;

mod consumer;
pub use consumer::*;

mod relay;
pub use relay::*;
