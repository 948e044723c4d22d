//! Thin command-line bridge over the kernel packet-filter subsystem: run
//! rule commands, parse the resulting `handle <N>` token, delete rules by
//! handle or by locating them in a chain listing, and read named counters.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

use crate::errors::QueueError;

const FILTER_BINARY: &str = "nft";

fn handle_pattern() -> Regex {
    Regex::new(r"handle\s+(\d+)").expect("static regex is valid")
}

fn packets_pattern() -> Regex {
    Regex::new(r"packets\s+(\d+)").expect("static regex is valid")
}

fn bytes_pattern() -> Regex {
    Regex::new(r"bytes\s+(\d+)").expect("static regex is valid")
}

/// Runs `nft <args>`, discarding its output. Returns [`QueueError::RuleCommand`]
/// if the process could not be spawned or exited non-zero.
pub fn run_discard(args: &[&str]) -> Result<(), QueueError> {
    let status = Command::new(FILTER_BINARY)
        .args(args)
        .status()
        .map_err(|e| QueueError::RuleCommand(e.to_string()))?;
    if !status.success() {
        return Err(QueueError::RuleCommand(format!("{FILTER_BINARY} exited with {status}")));
    }
    Ok(())
}

/// Runs `nft <args>` and returns its stdout as a string.
pub fn run_captured(args: &[&str]) -> Result<String, QueueError> {
    let output = Command::new(FILTER_BINARY).args(args).output().map_err(|e| QueueError::RuleCommand(e.to_string()))?;
    if !output.status.success() {
        return Err(QueueError::RuleCommand(format!("{FILTER_BINARY} exited with {}", output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extracts the first `handle <N>` token from command output.
pub fn parse_handle(output: &str) -> Option<u64> {
    handle_pattern().captures(output)?.get(1)?.as_str().parse().ok()
}

fn parse_counter_field(output: &str, pattern: &Regex) -> i64 {
    pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(-1)
}

/// Adds a rule, returning the handle the kernel assigned it.
pub fn add_rule(table: &str, chain: &str, rule: &str) -> Result<u64, QueueError> {
    let output = run_captured(&["add", "rule", table, chain, rule, "handle"])?;
    parse_handle(&output).ok_or_else(|| QueueError::RuleCommand("no handle in output".to_string()))
}

pub fn delete_by_handle(table: &str, chain: &str, handle: u64) -> Result<(), QueueError> {
    run_discard(&["delete", "rule", table, chain, "handle", &handle.to_string()])
}

/// Lists `chain`, finds the line containing `rule_text`, extracts its
/// handle, and deletes it.
pub fn delete_by_text(table: &str, chain: &str, rule_text: &str) -> Result<(), QueueError> {
    let listing = run_captured(&["list", "chain", table, chain])?;
    let line = listing
        .lines()
        .find(|line| line.contains(rule_text))
        .ok_or_else(|| QueueError::RuleCommand(format!("rule text {rule_text:?} not found in chain")))?;
    let handle = parse_handle(line).ok_or_else(|| QueueError::RuleCommand("no handle in matched line".to_string()))?;
    delete_by_handle(table, chain, handle)
}

/// Reads a packet-count counter named `name` in `table`. Returns `-1` if
/// the counter could not be read or parsed.
pub fn read_packet_counter(table: &str, name: &str) -> i64 {
    match run_captured(&["list", "counter", table, name]) {
        Ok(output) => parse_counter_field(&output, &packets_pattern()),
        Err(_) => -1,
    }
}

/// Reads a byte-count counter named `name` in `table`. Returns `-1` if the
/// counter could not be read or parsed.
pub fn read_byte_counter(table: &str, name: &str) -> i64 {
    match run_captured(&["list", "counter", table, name]) {
        Ok(output) => parse_counter_field(&output, &bytes_pattern()),
        Err(_) => -1,
    }
}

/// Monotonic-ish microsecond wall clock: seconds × 1e6 + microseconds.
pub fn now_micros() -> u64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() * 1_000_000 + u64::from(now.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handle_extracts_number() {
        let output = "table ip filter\nchain input { # handle 12\n  tcp dport 80 accept # handle 7\n}";
        assert_eq!(parse_handle(output), Some(12));
    }

    #[test]
    fn parse_handle_returns_none_when_absent() {
        assert_eq!(parse_handle("no handles here"), None);
    }

    #[test]
    fn parse_counter_fields_extract_packets_and_bytes() {
        let output = "counter packets 42 bytes 1337";
        assert_eq!(parse_counter_field(output, &packets_pattern()), 42);
        assert_eq!(parse_counter_field(output, &bytes_pattern()), 1337);
    }

    #[test]
    fn parse_counter_field_returns_sentinel_when_absent() {
        assert_eq!(parse_counter_field("garbage", &packets_pattern()), -1);
    }

    #[test]
    fn now_micros_is_monotonically_nondecreasing_across_two_calls() {
        let a = now_micros();
        let b = now_micros();
        assert!(b >= a);
    }
}
