//! Error kinds for the DPI core.
//!
//! Parsers never panic on untrusted input: they report failure through
//! [`ParseError`] and the caller falls back to the policy's default verdict.
//! [`QueueError`] carries kernel-interface failures, which are fatal at
//! startup and logged-and-continued at steady state.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("buffer too short: need at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("invalid field value: {0}")]
    InvalidField(String),
    #[error("compression pointer cycle or out-of-bounds offset")]
    CompressionCycle,
    #[error("name exceeded maximum decoded length")]
    NameTooLong,
    #[error("unsupported or reserved encoding: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to open kernel queue handle: {0}")]
    Open(String),
    #[error("failed to bind queue {queue_id}: {source}")]
    Bind { queue_id: u16, source: String },
    #[error("rule command failed: {0}")]
    RuleCommand(String),
}
