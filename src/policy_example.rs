//! Hand-written example of the contract the external profile translator's
//! generated per-device verdict code must honor (spec.md §4.11/§6). Not
//! part of the core's public contract — a demonstration harness in the
//! same spirit as the teacher's own `main` wiring a `DbManager` together,
//! gated behind a feature so it never ships in a consumer's build.

use std::net::IpAddr;
use std::sync::Arc;

use log::info;

use crate::dns_cache::DnsCache;
use crate::headers::{self, PROTO_UDP};
use crate::protocols::dns;
use crate::queue::interaction::InteractionData;
use crate::queue::runtime::{PacketObservation, Verdict};
use crate::rulebridge;

/// A toy two-state policy: state 0 waits for a DNS response naming
/// `watched_domain` and caches its address; state 1 only accepts packets
/// to/from the cached address, subject to the interaction's timeout gate.
pub struct DnsGatedPolicy {
    pub watched_domain: String,
    pub dns_cache: Arc<DnsCache>,
}

impl DnsGatedPolicy {
    pub fn new(watched_domain: impl Into<String>, dns_cache: Arc<DnsCache>) -> Self {
        Self { watched_domain: watched_domain.into(), dns_cache }
    }

    pub fn evaluate(
        &self,
        interaction: &InteractionData,
        payload: &[u8],
        observation: Option<&PacketObservation>,
    ) -> Verdict {
        if let Some(obs) = observation {
            info!("packet {} sha256={}", obs.packet_id, obs.payload_sha256);
        }

        let now_secs = rulebridge::now_micros() / 1_000_000;
        interaction.touch_last_request(now_secs);
        if interaction.is_timed_out(now_secs) {
            return Verdict::Drop;
        }

        match interaction.current_state() {
            0 => self.watch_for_dns_answer(interaction, payload, now_secs),
            _ => self.enforce_cached_destination(interaction, payload),
        }
    }

    fn watch_for_dns_answer(&self, interaction: &InteractionData, payload: &[u8], now_secs: u64) -> Verdict {
        let l4_offset = match headers::headers_length(payload) {
            0 => return Verdict::Accept,
            offset => offset,
        };
        let Some((_version, protocol)) = headers::headers_protocol(payload) else {
            return Verdict::Accept;
        };
        if protocol != PROTO_UDP || payload.len() <= l4_offset {
            return Verdict::Accept;
        }

        let message = dns::parse(&payload[l4_offset..]);
        if !message.header.map(|h| h.is_response()).unwrap_or(false) {
            return Verdict::Accept;
        }

        let addresses = dns::addresses_for_name(&message.answers, &self.watched_domain);
        if addresses.is_empty() {
            return Verdict::Accept;
        }

        self.dns_cache.add(&self.watched_domain, &addresses);
        interaction.set_cached_ip(addresses[0]);
        interaction.record_match(0, now_secs * 1_000_000);
        interaction.set_state(1);
        Verdict::Accept
    }

    fn enforce_cached_destination(&self, interaction: &InteractionData, payload: &[u8]) -> Verdict {
        let Some(cached) = interaction.cached_ip() else {
            return Verdict::Drop;
        };
        match headers::ip_addresses(payload) {
            Ok((src, dst)) if matches_cached(cached, src, dst) => Verdict::Accept,
            _ => Verdict::Drop,
        }
    }
}

fn matches_cached(cached: IpAddr, src: IpAddr, dst: IpAddr) -> bool {
    cached == src || cached == dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_out_before_inspecting_payload() {
        let interaction = InteractionData::new(0, 1, 2, -1);
        let policy = DnsGatedPolicy::new("example.com", Arc::new(DnsCache::new()));
        let verdict = policy.evaluate(&interaction, &[], None);
        assert_eq!(verdict, Verdict::Accept);
    }
}
