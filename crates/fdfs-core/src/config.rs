//! Configuration system for the FDFS client
//!
//! Two file formats are accepted:
//! - TOML (`*.toml`), deserialized with serde
//! - Classic `client.conf` style `key = value` lines, where `tracker_server`
//!   may repeat
//!
//! The default location is:
//! - macOS: ~/Library/Application Support/fdfs/config.toml
//! - Linux: ~/.config/fdfs/config.toml
//! - Windows: %APPDATA%/fdfs/config.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DEFAULT_MAX_CONNS;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracker addresses as `host:port`
    pub tracker_servers: Vec<String>,
    /// Maximum live connections per tracker or storage pool
    pub max_conns: usize,
    /// Socket settings
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracker_servers: Vec::new(),
            max_conns: DEFAULT_MAX_CONNS,
            network: NetworkConfig::default(),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Read/write timeout in seconds (0 = block forever)
    pub network_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            network_timeout_secs: 30,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn network_timeout(&self) -> Option<Duration> {
        match self.network_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Config {
    /// Configuration for the given trackers with default limits
    pub fn with_trackers<I, S>(trackers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracker_servers: trackers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        let is_toml = path.extension().map_or(false, |ext| ext == "toml");
        let config = if is_toml {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            Self::parse_conf(&content)?
        };

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Parse classic `key = value` client configuration.
    ///
    /// Unknown keys are ignored so a full `client.conf` can be used as is.
    pub fn parse_conf(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::Parse(format!("line {}: expected key = value", lineno + 1))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "tracker_server" => config.tracker_servers.push(value.to_string()),
                "max_conns" | "maxConns" => config.max_conns = parse_number(key, value)?,
                "connect_timeout" => config.network.connect_timeout_secs = parse_number(key, value)?,
                "network_timeout" => config.network.network_timeout_secs = parse_number(key, value)?,
                _ => debug!("Ignoring config key {}", key),
            }
        }

        Ok(config)
    }

    /// Check the configuration can build a client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracker_servers.is_empty() {
            return Err(ConfigError::NoTrackers);
        }
        if self.max_conns == 0 {
            return Err(ConfigError::Invalid("max_conns must be positive".into()));
        }
        for addr in &self.tracker_servers {
            // Only the shape is checked; resolution happens at dial time
            match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "tracker address {:?} is not host:port",
                        addr
                    )))
                }
            }
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "fdfs", "fdfs")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Generate a sample configuration file content
    pub fn sample() -> String {
        let config = Self::with_trackers([format!("127.0.0.1:{}", crate::DEFAULT_TRACKER_PORT)]);
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Parse(format!("{}: {:?} is not a number", key, value)))
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// I/O error
    Io(String),
    /// Parse error
    Parse(String),
    /// No tracker address configured
    NoTrackers,
    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::NoTrackers => write!(f, "No tracker server configured"),
            ConfigError::Invalid(e) => write!(f, "Invalid value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
