use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vmu_product::Channel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Link transport selected for inbound connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Binary,
    #[serde(alias = "rfc1952")]
    Gzip,
    #[serde(rename = "binary+gzip")]
    BinaryGzip,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listen address for the acquisition link.
    pub address: String,

    #[serde(default)]
    pub mode: Mode,

    /// Optional TCP mirror of the inbound byte stream.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    /// Instance allow-list; empty admits every instance.
    #[serde(default)]
    pub instances: Vec<u8>,

    /// Notification age gate in seconds; 0 notifies regardless of age.
    #[serde(default)]
    pub age: u64,

    #[serde(default, rename = "storage")]
    pub stores: Vec<StoreConfig>,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub address: String,
    /// Compression keyword: no, speed, best, default. Anything else mirrors
    /// uncompressed.
    #[serde(default)]
    pub level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    File,
    Http,
    Hrdp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub disabled: bool,
    #[serde(rename = "type")]
    pub kind: StoreKind,
    pub location: String,
    /// Hard-link mirror directory for the file store.
    #[serde(default, rename = "link")]
    pub mirror: Option<PathBuf>,
    /// Wrap products into raw archive records instead of their logical
    /// export.
    #[serde(default)]
    pub raw: bool,
    /// Minute granularity of the archive tree; 0 disables the minute level.
    #[serde(default)]
    pub interval: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Aggregation interval in seconds.
    #[serde(default = "default_pool_interval")]
    pub interval: u64,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { interval: default_pool_interval(), notifiers: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Udp,
    Logger,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(rename = "type")]
    pub kind: NotifierKind,
    #[serde(default)]
    pub location: String,
    /// `realtime`, `playback`, or empty for both.
    #[serde(default)]
    pub source: String,
    /// Negative admits every instance.
    #[serde(default = "default_notifier_instance")]
    pub instance: i32,
    /// Channel values 1..=3; empty admits every channel.
    #[serde(default)]
    pub channels: Vec<u8>,
}

impl NotifierConfig {
    pub fn channel_set(&self) -> Result<Vec<Channel>, ConfigError> {
        self.channels
            .iter()
            .map(|&c| {
                Channel::try_from(c).map_err(|_| ConfigError::Validation(format!("unknown notifier channel {c}")))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    pub kind: String,
    #[serde(default)]
    pub config: Option<PathBuf>,
}

fn default_pool_interval() -> u64 {
    5
}

fn default_notifier_instance() -> i32 {
    -1
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.is_empty() {
            return Err(ConfigError::Validation("listen address cannot be empty".to_string()));
        }
        if !self.stores.iter().any(|s| !s.disabled) {
            return Err(ConfigError::Validation("no storage defined".to_string()));
        }
        if self.pool.interval == 0 && !self.pool.notifiers.is_empty() {
            return Err(ConfigError::Validation("pool interval must be > 0".to_string()));
        }
        for n in &self.pool.notifiers {
            n.channel_set()?;
            match n.source.as_str() {
                "" | "realtime" | "playback" => {}
                other => {
                    return Err(ConfigError::Validation(format!("unknown notifier source {other}")));
                }
            }
            if n.kind == NotifierKind::Udp && n.location.is_empty() {
                return Err(ConfigError::Validation("udp notifier requires a location".to_string()));
            }
        }
        Ok(())
    }
}
