//! Alias management
//!
//! An alias names an S3-compatible endpoint together with its credentials and
//! optional transfer tuning.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigManager, TransferConfig};
use crate::error::{Error, Result};

/// A configured endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alias {
    pub name: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the config-wide transfer defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferConfig>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Alias {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            transfer: None,
        }
    }

    /// Transfer settings for this alias, falling back to `defaults`
    pub fn transfer_config(&self, defaults: &TransferConfig) -> TransferConfig {
        self.transfer.clone().unwrap_or_else(|| defaults.clone())
    }
}

/// Looks up and edits aliases in the configuration file
#[derive(Debug)]
pub struct AliasManager {
    manager: ConfigManager,
    config: Config,
}

impl AliasManager {
    pub fn new() -> Result<Self> {
        Self::with_manager(ConfigManager::new()?)
    }

    pub fn with_manager(manager: ConfigManager) -> Result<Self> {
        let config = manager.load()?;
        Ok(Self { manager, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn list(&self) -> &[Alias] {
        &self.config.aliases
    }

    pub fn get(&self, name: &str) -> Result<Alias> {
        self.config
            .aliases
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| Error::AliasNotFound(name.to_string()))
    }

    /// Add or replace an alias and persist the configuration
    pub fn set(&mut self, alias: Alias) -> Result<()> {
        if let Some(transfer) = &alias.transfer {
            transfer.validate()?;
        }
        self.config.aliases.retain(|a| a.name != alias.name);
        self.config.aliases.push(alias);
        self.manager.save(&self.config)
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let before = self.config.aliases.len();
        self.config.aliases.retain(|a| a.name != name);
        if self.config.aliases.len() == before {
            return Err(Error::AliasNotFound(name.to_string()));
        }
        self.manager.save(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn manager(dir: &TempDir) -> AliasManager {
        AliasManager::with_manager(ConfigManager::with_path(dir.path().join("config.toml")))
            .unwrap()
    }

    #[test]
    fn test_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let mut aliases = manager(&dir);
        assert!(aliases.list().is_empty());

        aliases
            .set(Alias::new("local", "http://localhost:9000", "ak", "sk"))
            .unwrap();
        assert_eq!(aliases.get("local").unwrap().region, "us-east-1");

        // Persisted across managers
        let reloaded = manager(&dir);
        assert_eq!(reloaded.list().len(), 1);

        aliases.remove("local").unwrap();
        assert!(matches!(aliases.get("local"), Err(Error::AliasNotFound(_))));
        assert!(aliases.remove("local").is_err());
    }

    #[test]
    fn test_set_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let mut aliases = manager(&dir);
        aliases.set(Alias::new("a", "http://one", "ak", "sk")).unwrap();
        aliases.set(Alias::new("a", "http://two", "ak", "sk")).unwrap();
        assert_eq!(aliases.list().len(), 1);
        assert_eq!(aliases.get("a").unwrap().endpoint, "http://two");
    }

    #[test]
    fn test_transfer_config_override() {
        let defaults = TransferConfig::default();
        let mut alias = Alias::new("a", "http://one", "ak", "sk");
        assert_eq!(alias.transfer_config(&defaults), defaults);

        let custom = TransferConfig {
            chunk_size: 16 * 1024 * 1024,
            ..Default::default()
        };
        alias.transfer = Some(custom.clone());
        assert_eq!(alias.transfer_config(&defaults), custom);
    }
}
