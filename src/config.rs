//! TOML configuration for server binaries.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::pcap::EmissionMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("cannot parse {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

/// Server settings, all optional in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the TCP listener binds.
    pub listen: SocketAddr,
    /// Export path announced to MOUNT clients.
    pub export: String,
    /// Packet capture tap; disabled when absent.
    pub capture: Option<CaptureConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self { listen: "127.0.0.1:2049".parse().expect("literal address"), export: "/".to_string(), capture: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// Where the `.pcap` file is written.
    pub path: PathBuf,
    #[serde(default)]
    pub mode: CaptureMode,
    /// When present, records are held in a bounded in-memory ring and
    /// written to `path` only when a dump is triggered, instead of being
    /// streamed as they happen.
    pub ring: Option<RingConfig>,
}

/// Budgets for the in-memory capture ring.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RingConfig {
    pub max_fragments: usize,
    pub max_bytes: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { max_fragments: 1024, max_bytes: 4 * 1024 * 1024 }
    }
}

#[derive(Debug, Copy, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    #[default]
    WhenIssued,
    WhenCompleted,
}

impl From<CaptureMode> for EmissionMode {
    fn from(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::WhenIssued => EmissionMode::WhenIssued,
            CaptureMode::WhenCompleted => EmissionMode::WhenCompleted,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}
