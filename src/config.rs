//! Configuration management for netaction

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{ActionError, NetResult};

/// Largest accepted `ping.max_count`
pub const PING_COUNT_LIMIT: u32 = 10_000;

/// Largest accepted `traceroute.max_hops` (traceroute's own ceiling)
pub const HOP_LIMIT: u32 = 255;

/// Main netaction configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetactionConfig {
    /// External tool paths
    #[serde(default)]
    pub tools: ToolPaths,
    /// Reachability probe settings
    #[serde(default)]
    pub ping: PingSettings,
    /// Path tracing settings
    #[serde(default)]
    pub traceroute: TracerouteSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// iproute2 `ip` binary
    #[serde(default = "default_ip_bin")]
    pub ip: PathBuf,
    /// `ping` binary
    #[serde(default = "default_ping_bin")]
    pub ping: PathBuf,
    /// `traceroute` binary
    #[serde(default = "default_traceroute_bin")]
    pub traceroute: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingSettings {
    /// Upper bound accepted for the Count argument
    #[serde(default = "default_max_count")]
    pub max_count: u32,
    /// Per-probe wait in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerouteSettings {
    /// Upper bound accepted for the MaxHops argument, and its default
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
    /// Per-probe wait in seconds
    #[serde(default = "default_timeout_secs")]
    pub wait_secs: u32,
    /// Probes sent per hop
    #[serde(default = "default_queries")]
    pub queries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, written in addition to stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_ip_bin() -> PathBuf {
    PathBuf::from("ip")
}

fn default_ping_bin() -> PathBuf {
    PathBuf::from("ping")
}

fn default_traceroute_bin() -> PathBuf {
    PathBuf::from("traceroute")
}

fn default_max_hops() -> u32 {
    30
}

fn default_queries() -> u32 {
    3
}

fn default_max_count() -> u32 {
    100
}

fn default_timeout_secs() -> u32 {
    1
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ip: default_ip_bin(),
            ping: default_ping_bin(),
            traceroute: default_traceroute_bin(),
        }
    }
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TracerouteSettings {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            wait_secs: default_timeout_secs(),
            queries: default_queries(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl NetactionConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> NetResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ActionError::Config(format!("Failed to read config {:?}: {}", path.as_ref(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> NetResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ActionError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> NetResult<()> {
        if self.ping.max_count == 0 || self.ping.max_count > PING_COUNT_LIMIT {
            return Err(ActionError::Config(format!(
                "ping.max_count must be between 1 and {}",
                PING_COUNT_LIMIT
            )));
        }
        if self.ping.timeout_secs == 0 {
            return Err(ActionError::Config("ping.timeout_secs must be at least 1".to_string()));
        }
        if self.traceroute.max_hops == 0 || self.traceroute.max_hops > HOP_LIMIT {
            return Err(ActionError::Config(format!(
                "traceroute.max_hops must be between 1 and {}",
                HOP_LIMIT
            )));
        }
        if self.traceroute.wait_secs == 0 {
            return Err(ActionError::Config("traceroute.wait_secs must be at least 1".to_string()));
        }
        if !(1..=10).contains(&self.traceroute.queries) {
            return Err(ActionError::Config("traceroute.queries must be between 1 and 10".to_string()));
        }
        Ok(())
    }
}
