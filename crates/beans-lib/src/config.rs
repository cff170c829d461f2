//! Store configuration (`.beans.yml`).
//!
//! Every field has a default, so a missing or partial file is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::write_atomic;
use crate::error::{BeansError, Result};
use crate::ids::is_valid_prefix;
use crate::model::{LinkType, Status};

/// Name of the config file at the project root.
pub const CONFIG_FILE_NAME: &str = ".beans.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub beans: StoreConfig,
    pub gitflow: GitFlowConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory, relative to the config file's directory.
    pub path: PathBuf,
    pub prefix: String,
    pub id_length: usize,
    /// Reject updates that carry no ETag.
    pub require_etag: bool,
    /// Statuses archived by `archive_eligible`.
    pub archive_statuses: Vec<Status>,
    /// Link types checked for cycles.
    pub hierarchical_link_types: Vec<LinkType>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".beans"),
            prefix: "beans".to_string(),
            id_length: 4,
            require_etag: false,
            archive_statuses: vec![Status::Completed, Status::Scrapped],
            hierarchical_link_types: vec![LinkType::Blocks, LinkType::Parent],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitFlowConfig {
    pub enabled: bool,
    pub base_branch: String,
    pub auto_create_branch: bool,
    pub auto_commit_beans: bool,
}

impl Default for GitFlowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_branch: "main".to_string(),
            auto_create_branch: true,
            auto_commit_beans: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub debounce_ms: u64,
    /// Batches queued per subscriber before the oldest is dropped.
    pub subscriber_buffer: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            subscriber_buffer: 16,
        }
    }
}

impl WatchConfig {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| BeansError::Config(format!("{}: {e}", path.display())))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Write the config as YAML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        write_atomic(path, &yaml)
    }

    /// Reject values the store cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_prefix(&self.beans.prefix) {
            return Err(BeansError::Config(format!(
                "invalid id prefix '{}': use lowercase letters, digits, '_' and single dashes",
                self.beans.prefix
            )));
        }
        if self.beans.id_length == 0 {
            return Err(BeansError::Config("id_length must be at least 1".into()));
        }
        if self.beans.path.as_os_str().is_empty() {
            return Err(BeansError::Config("beans.path must not be empty".into()));
        }
        if self.watch.subscriber_buffer == 0 {
            return Err(BeansError::Config(
                "watch.subscriber_buffer must be at least 1".into(),
            ));
        }
        if self.gitflow.base_branch.trim().is_empty() {
            return Err(BeansError::Config(
                "gitflow.base_branch must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Store directory resolved against the directory holding the config.
    #[must_use]
    pub fn store_root(&self, project_dir: &Path) -> PathBuf {
        if self.beans.path.is_absolute() {
            self.beans.path.clone()
        } else {
            project_dir.join(&self.beans.path)
        }
    }
}
