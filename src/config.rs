//! Daemon configuration: a small TOML-backed `AppConfig` plus the CLI
//! surface (config path, verbosity) that systems daemons in this corpus
//! typically expose.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "smarthome-dpi-core", about = "Per-device DPI firewall core")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Log verbosity: 0=error .. 4+=trace.
    #[arg(short, long, default_value_t = 2)]
    pub verbosity: u64,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Kernel queue identifier the runtime binds to.
    pub queue_id: u16,
    /// Default interaction timeout in seconds (0 ⇒ 3600s default, <0 ⇒ disabled).
    #[serde(default)]
    pub default_timeout_secs: i64,
    /// nftables table name the rule-counter bridge operates against.
    pub table: String,
    /// nftables chain name the rule-counter bridge operates against.
    pub chain: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    Read(PathBuf, String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let toml = r#"
            queue_id = 0
            table = "filter"
            chain = "forward"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.queue_id, 0);
        assert_eq!(config.default_timeout_secs, 0);
        assert_eq!(config.table, "filter");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_, _)));
    }
}
