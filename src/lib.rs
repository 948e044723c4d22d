//! Per-device, profile-driven Smart Home DPI firewall core: application
//! protocol parsers, the DNS domain-to-address cache, the rule-counter
//! bridge to the kernel packet-filter subsystem, and the per-interaction
//! queue runtime that issues accept/drop verdicts.

pub mod bytes;
pub mod config;
pub mod dns_cache;
pub mod errors;
pub mod headers;
pub mod protocols;
pub mod queue;
pub mod rulebridge;
pub mod utils;

#[cfg(feature = "example-policy")]
pub mod policy_example;
