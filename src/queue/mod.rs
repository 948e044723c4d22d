//! Kernel-to-userspace packet queue runtime and per-interaction state.

pub mod interaction;
pub mod runtime;

pub use interaction::{ActivityPeriod, Counters, InteractionData};
pub use runtime::{PacketObservation, PolicyCallback, QueueConfig, Verdict};
