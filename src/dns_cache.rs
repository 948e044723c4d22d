//! Domain-name → address cache fed by observed DNS answers.
//!
//! Entries accumulate: a second answer for the same name appends to its
//! address list rather than replacing it, and there is no TTL-driven
//! eviction (per the expanded spec's resolution of that open question —
//! the upstream reference never evicts either).

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct DnsCache {
    entries: Mutex<HashMap<String, Vec<IpAddr>>>,
}

impl DnsCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Appends `addresses` to `name`'s entry, creating it if absent.
    /// Duplicate addresses are not filtered — a name answered twice with
    /// the same address accumulates both.
    pub fn add(&self, name: &str, addresses: &[IpAddr]) {
        let mut entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries.entry(name.to_string()).or_default().extend_from_slice(addresses);
    }

    pub fn get(&self, name: &str) -> Option<Vec<IpAddr>> {
        let entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries.contains_key(name)
    }

    /// Frees `name`'s entry. No-op if `name` isn't cached.
    pub fn remove(&self, name: &str) {
        let mut entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries.remove(name);
    }

    /// Detaches and returns ownership of `name`'s whole address list,
    /// removing the entry. `None` if `name` isn't cached.
    pub fn pop(&self, name: &str) -> Option<Vec<IpAddr>> {
        let mut entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dns cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
