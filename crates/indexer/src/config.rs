//! Configuration management for the transferwatch indexer.
//!
//! This module handles loading configuration from:
//! - TOML files
//! - Environment variables (`${VAR}` placeholders, expanded before parsing)
//! - Default values (fallbacks)
//!
//! The file is validated once at startup and turned into an immutable [`WatchConfig`]
//! that is passed explicitly to every component.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use transferwatch_core::{
    WatchSet, DEFAULT_BATCH_SIZE, DEFAULT_CONFIRMATIONS, DEFAULT_LOOKBACK_BLOCKS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RPC_TIMEOUT_SECS,
};

/// Main configuration for the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    pub network: NetworkConfig,

    /// What to watch
    pub watch: WatchSection,

    /// Sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Ethereum RPC URL
    pub rpc_url: String,

    /// Per-call RPC timeout in seconds
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

/// Watch configuration as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSection {
    /// Account whose incoming transfers are recorded
    pub account: Address,

    /// ERC-1155 contract emitting the transfers
    pub contract: Address,

    /// Watched asset ids (integers, decimal strings or 0x-hex strings)
    pub asset_ids: Vec<AssetIdEntry>,
}

/// One asset id entry in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetIdEntry {
    /// Small ids written as TOML integers
    Number(u64),
    /// Ids too large for TOML integers, or hex
    Text(String),
}

impl AssetIdEntry {
    fn as_text(&self) -> String {
        match self {
            AssetIdEntry::Number(n) => n.to_string(),
            AssetIdEntry::Text(s) => s.clone(),
        }
    }
}

/// Sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Explicit block to start from on a fresh install (overrides the lookback window)
    #[serde(default)]
    pub start_block: Option<u64>,

    /// How far behind the head a fresh install starts
    #[serde(default = "default_lookback_blocks")]
    pub lookback_blocks: u64,

    /// Maximum sub-range width (`end - start`) per log query
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Number of confirmations to wait before processing blocks
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    /// Delay between live poll ticks, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_block: None,
            lookback_blocks: default_lookback_blocks(),
            batch_size: default_batch_size(),
            confirmations: default_confirmations(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Checkpoint and records as JSON files
    Json,
    /// Checkpoint and records in SQLite
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Checkpoint file (json backend)
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,

    /// Record file (json backend)
    #[serde(default = "default_records_path")]
    pub records_path: String,

    /// Database URL (sqlite backend)
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            checkpoint_path: default_checkpoint_path(),
            records_path: default_records_path(),
            database_url: default_database_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_rpc_timeout_secs() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

fn default_lookback_blocks() -> u64 {
    DEFAULT_LOOKBACK_BLOCKS
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_backend() -> StorageBackend {
    StorageBackend::Json
}

fn default_checkpoint_path() -> String {
    "data/checkpoint.json".to_string()
}

fn default_records_path() -> String {
    "data/transfers.json".to_string()
}

fn default_database_url() -> String {
    "sqlite://transferwatch.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Validated, immutable watch parameters shared by the scanning components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Receiver whose transfers are recorded
    pub account: Address,
    /// Contract emitting the transfer events
    pub contract: Address,
    /// Asset ids of interest
    pub watch_set: WatchSet,
    /// Trailing blocks treated as not yet final
    pub confirmations: u64,
    /// Maximum sub-range width per query
    pub batch_size: u64,
    /// Fresh-install lookback from the head
    pub lookback_blocks: u64,
    /// Fresh-install start override
    pub start_block: Option<u64>,
    /// Delay between poll ticks
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax.
    /// For example: `rpc_url = "https://mainnet.infura.io/v3/${INFURA_KEY}"`
    ///
    /// # Example
    /// ```no_run
    /// # use transferwatch_indexer::config::Config;
    /// let config = Config::from_file("transferwatch.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = expand_env_vars(&contents)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.network.rpc_url.trim().is_empty() {
            anyhow::bail!("Network RPC URL cannot be empty");
        }
        if self.network.rpc_timeout_secs == 0 {
            anyhow::bail!("Network rpc_timeout_secs must be > 0");
        }

        if self.watch.account.is_zero() {
            anyhow::bail!("Watch account must be a non-zero address");
        }
        if self.watch.contract.is_zero() {
            anyhow::bail!("Watch contract must be a non-zero address");
        }
        self.watch_set()?;

        if self.sync.batch_size == 0 {
            anyhow::bail!("Sync batch_size must be > 0");
        }
        if self.sync.poll_interval_secs == 0 {
            anyhow::bail!("Sync poll_interval_secs must be > 0");
        }

        match self.storage.backend {
            StorageBackend::Json => {
                if self.storage.checkpoint_path.trim().is_empty() {
                    anyhow::bail!("Storage checkpoint_path cannot be empty");
                }
                if self.storage.records_path.trim().is_empty() {
                    anyhow::bail!("Storage records_path cannot be empty");
                }
                if self.storage.checkpoint_path == self.storage.records_path {
                    anyhow::bail!("Storage checkpoint_path and records_path must differ");
                }
            }
            StorageBackend::Sqlite => {
                if self.storage.database_url.trim().is_empty() {
                    anyhow::bail!("Storage database_url cannot be empty");
                }
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }

    /// Parse the configured asset ids.
    pub fn watch_set(&self) -> Result<WatchSet> {
        let ids: Vec<String> = self.watch.asset_ids.iter().map(AssetIdEntry::as_text).collect();
        WatchSet::parse(&ids).context("Invalid watch asset_ids")
    }

    /// Build the immutable runtime view of this configuration.
    pub fn watch_config(&self) -> Result<WatchConfig> {
        Ok(WatchConfig {
            account: self.watch.account,
            contract: self.watch.contract,
            watch_set: self.watch_set()?,
            confirmations: self.sync.confirmations,
            batch_size: self.sync.batch_size,
            lookback_blocks: self.sync.lookback_blocks,
            start_block: self.sync.start_block,
            poll_interval: Duration::from_secs(self.sync.poll_interval_secs),
        })
    }

    /// Per-call RPC timeout.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.network.rpc_timeout_secs)
    }
}

/// Expand `${VAR_NAME}` placeholders from the environment.
///
/// Placeholders inside TOML comments are left untouched; placeholders inside strings
/// (basic, literal and their multi-line forms) are expanded. Referencing an unset
/// variable is an error.
pub fn expand_env_vars(input: &str) -> Result<String> {
    const DELIMITERS: [&str; 4] = ["\"\"\"", "'''", "\"", "'"];

    let mut out = String::with_capacity(input.len());
    let mut open: Option<&str> = None;
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        match open {
            None if ch == '#' => {
                let end = rest.find('\n').unwrap_or(rest.len());
                out.push_str(&rest[..end]);
                rest = &rest[end..];
                continue;
            }
            None => {
                if let Some(delim) = DELIMITERS.iter().find(|d| rest.starts_with(**d)) {
                    out.push_str(delim);
                    rest = &rest[delim.len()..];
                    open = Some(*delim);
                    continue;
                }
            }
            Some(delim) => {
                if ch == '\\' && delim.starts_with('"') {
                    // Copy the escape pair so an escaped quote does not close the string
                    let len = 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
                    out.push_str(&rest[..len]);
                    rest = &rest[len..];
                    continue;
                }
                if rest.starts_with(delim) {
                    out.push_str(delim);
                    rest = &rest[delim.len()..];
                    open = None;
                    continue;
                }
                if ch == '\n' && delim.len() == 1 {
                    // Unterminated single-line string; leave it for the TOML parser
                    open = None;
                }
            }
        }

        if rest.starts_with("${") {
            let line_end = rest.find('\n').unwrap_or(rest.len());
            let Some(close) = rest[..line_end].find('}') else {
                anyhow::bail!(
                    "Unclosed environment variable placeholder: {}",
                    &rest[..line_end]
                );
            };

            let name = &rest[2..close];
            if name.is_empty() {
                anyhow::bail!("Empty environment variable name");
            }

            let value = std::env::var(name)
                .with_context(|| format!("Environment variable '{}' is not set", name))?;
            out.push_str(&value);
            rest = &rest[close + 1..];
            continue;
        }

        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    Ok(out)
}
