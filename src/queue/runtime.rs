//! Per-queue worker: binds to a kernel queue identifier, blocks on
//! packet receive, dispatches to a per-policy callback, and replies with
//! a verdict. One OS thread per queue id (spec.md §4.11/§5 — the
//! "packet order preserved per queue" invariant only requires serializing
//! *within* a queue, which a dedicated blocking thread gives for free).

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, error, info, warn};
use nfq::{Queue, Verdict as NfqVerdict};

#[cfg(feature = "observability")]
use crate::bytes::sha256;
use crate::errors::QueueError;
use crate::queue::interaction::InteractionData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Drop,
}

impl From<Verdict> for NfqVerdict {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accept => NfqVerdict::Accept,
            Verdict::Drop => NfqVerdict::Drop,
        }
    }
}

/// Timestamp + payload digest captured when the `observability` feature is
/// enabled, passed to the policy callback instead of a second callback
/// signature (REDESIGN FLAGS: one callback signature always). The type is
/// always available so callers don't need to `#[cfg]` their own code; with
/// the feature off, `run` never constructs one and the callback always
/// receives `None`.
#[derive(Debug, Clone)]
pub struct PacketObservation {
    pub packet_id: u32,
    pub timestamp_micros: u64,
    pub payload_sha256: String,
}

/// Per-policy verdict callback: receives the interaction's shared state,
/// the raw packet payload, and an optional observation record.
pub type PolicyCallback =
    Arc<dyn Fn(&InteractionData, &[u8], Option<&PacketObservation>) -> Verdict + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub queue_id: u16,
    /// Copy-packet snaplen; the crate's safe nfq binding does not expose a
    /// socket option to request a specific value so this is documentary
    /// (the kernel default copies the whole packet already).
    pub snaplen: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { queue_id: 0, snaplen: 65536 }
    }
}

#[cfg(feature = "observability")]
fn observe(packet_id: u32, payload: &[u8]) -> PacketObservation {
    PacketObservation {
        packet_id,
        timestamp_micros: crate::rulebridge::now_micros(),
        payload_sha256: crate::bytes::bytes_to_hex(&sha256(payload)),
    }
}

/// The nfq crate threads the kernel-assigned packet id through internally
/// (`Queue::verdict` needs it, not the caller), so it isn't exposed on
/// `Message`. We surface a locally monotonic id for logging/observation
/// purposes instead, scoped per worker thread.
fn next_local_packet_id(counter: &mut u32) -> u32 {
    *counter = counter.wrapping_add(1);
    *counter
}

/// Opens and binds the kernel queue, then blocks forever dispatching
/// packets to `callback`. Bind failures are fatal (spec.md §4.11); parse
/// or callback panics are not caught here — that responsibility belongs to
/// the generated policy, which must not panic on malformed input.
fn run(config: QueueConfig, interaction: Arc<InteractionData>, callback: PolicyCallback) {
    let mut queue = match Queue::open() {
        Ok(q) => q,
        Err(e) => {
            error!("failed to open kernel queue handle: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = queue.bind(config.queue_id) {
        error!("failed to bind queue {}: {e}", config.queue_id);
        std::process::exit(1);
    }
    info!("queue {} bound, entering receive loop", config.queue_id);
    let mut local_packet_id = 0u32;

    loop {
        let mut message = match queue.recv() {
            Ok(msg) => msg,
            Err(e) => {
                warn!("queue {}: recv error, packet lost: {e}", config.queue_id);
                continue;
            }
        };

        let payload = message.get_payload();
        let packet_id = next_local_packet_id(&mut local_packet_id);
        #[cfg(feature = "observability")]
        let observation = Some(observe(packet_id, payload));
        #[cfg(not(feature = "observability"))]
        let observation: Option<PacketObservation> = None;

        let verdict = callback(&interaction, payload, observation.as_ref());
        debug!("queue {}: packet {packet_id} -> {verdict:?}", config.queue_id);
        message.set_verdict(verdict.into());
        if let Err(e) = queue.verdict(message) {
            warn!("queue {}: failed to set verdict: {e}", config.queue_id);
        }
    }
}

/// Spawns the blocking receive loop on its own OS thread.
pub fn spawn_worker(config: QueueConfig, interaction: Arc<InteractionData>, callback: PolicyCallback) -> JoinHandle<()> {
    std::thread::spawn(move || run(config, interaction, callback))
}

/// Synchronous open+bind check used at startup before spawning workers, so
/// a misconfigured queue id fails fast with a [`QueueError`] instead of a
/// bare process exit deep inside a worker thread.
pub fn preflight_bind(queue_id: u16) -> Result<(), QueueError> {
    let mut queue = Queue::open().map_err(|e| QueueError::Open(e.to_string()))?;
    queue.bind(queue_id).map_err(|e| QueueError::Bind { queue_id, source: e.to_string() })
}
