use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Server entry {0} has an empty name")]
    EmptyServerName(usize),
    #[error("Server {0} is configured more than once")]
    DuplicateServer(String),
    #[error("Server {0} has no snapshot path")]
    MissingSnapshot(String),
    #[error("max_items must be greater than zero")]
    ZeroMaxItems,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub merge: MergeOptions,
}

/// One media server whose exported library snapshot takes part in the merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON item listing; relative paths are taken from the config directory
    pub snapshot: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Stop reading a snapshot after this many items
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default = "default_true")]
    pub report_name_collisions: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            max_items: None,
            report_name_collisions: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load_from_file`], but a missing file yields defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merge.max_items == Some(0) {
            return Err(ConfigError::ZeroMaxItems);
        }

        let mut seen = BTreeSet::new();
        for (index, server) in self.servers.iter().enumerate() {
            let name = server.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyServerName(index));
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateServer(name.to_string()));
            }
            if server.snapshot.as_os_str().is_empty() {
                return Err(ConfigError::MissingSnapshot(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|server| server.enabled)
    }
}
