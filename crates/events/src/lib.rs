//! In-process job lifecycle event bus.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope.
//!
//! The dependency sequencer subscribes to learn when prerequisites finish.

pub mod bus;

pub use bus::{EventBus, PlatformEvent};
