//! Configuration management
//!
//! Handles loading and saving the TOML configuration file, and the transfer
//! tuning knobs (retry budgets, part size) that go with each alias.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "XFER_CONFIG_DIR";

/// Smallest part size S3 accepts for any part but the last
pub const MIN_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Tuning for one logical transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub retry: RetryConfig,
    /// Bytes per part in a chunked transfer
    pub chunk_size: usize,
    /// Payloads at least this large are sent chunked when the caller asks for
    /// automatic mode
    pub multipart_threshold: u64,
    /// Permit parts below [`MIN_CHUNK_SIZE`] (for servers that allow them)
    pub allow_small_chunks: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            chunk_size: 8 * 1024 * 1024,
            multipart_threshold: 64 * 1024 * 1024,
            allow_small_chunks: false,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_size < MIN_CHUNK_SIZE && !self.allow_small_chunks {
            return Err(Error::Config(format!(
                "chunk_size {} is below the {MIN_CHUNK_SIZE} byte minimum part size",
                self.chunk_size
            )));
        }
        self.retry.validate()
    }

    /// Whether a payload of `size` bytes should be sent chunked
    pub fn wants_chunked(&self, size: Option<u64>) -> bool {
        size.is_none_or(|s| s >= self.multipart_threshold)
    }
}

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Transfer defaults for aliases that do not override them
    #[serde(default)]
    pub defaults: TransferConfig,

    #[serde(default)]
    pub aliases: Vec<Alias>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: TransferConfig::default(),
            aliases: Vec::new(),
        }
    }
}

/// Loads and stores [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Use the default location: `$XFER_CONFIG_DIR/config.toml`, falling back
    /// to the platform config directory
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))?
                .join("xfer"),
        };
        Ok(Self::with_path(dir.join("config.toml")))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration; a missing file yields the default config
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "config schema version {} is newer than supported version {SCHEMA_VERSION}",
                config.schema_version
            )));
        }

        config.defaults.validate()?;
        for alias in &config.aliases {
            if let Some(transfer) = &alias.transfer {
                transfer.validate()?;
            }
        }

        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));
        let config = manager.load().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested/config.toml"));

        let mut config = Config::default();
        config.defaults.retry.timeout.max_attempts = 12;
        config
            .aliases
            .push(Alias::new("local", "http://localhost:9000", "ak", "sk"));
        manager.save(&config).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[defaults]
chunk_size = 16777216

[defaults.retry.server]
max_attempts = 3
initial_backoff_ms = 50
max_backoff_ms = 1000
"#,
        )
        .unwrap();

        let config = ConfigManager::with_path(&path).load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.defaults.chunk_size, 16 * 1024 * 1024);
        assert_eq!(config.defaults.retry.server.max_attempts, 3);
        assert_eq!(
            config.defaults.retry.timeout,
            crate::retry::RetryPolicy::timeout_default()
        );
        assert!(config.defaults.retry.retry_transport_errors);
    }

    #[test]
    fn test_rejects_small_chunks_and_newer_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[defaults]\nchunk_size = 1024\n").unwrap();
        assert!(matches!(
            ConfigManager::with_path(&path).load(),
            Err(Error::Config(_))
        ));

        std::fs::write(&path, "schema_version = 99\n").unwrap();
        assert!(matches!(
            ConfigManager::with_path(&path).load(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_wants_chunked() {
        let config = TransferConfig::default();
        assert!(!config.wants_chunked(Some(1024)));
        assert!(config.wants_chunked(Some(config.multipart_threshold)));
        assert!(config.wants_chunked(None));
    }
}
