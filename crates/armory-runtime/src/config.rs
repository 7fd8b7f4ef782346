//! Configuration
//!
//! `RegistryConfig` is the persisted JSON file holding the four category
//! lists. `NodeConfig` holds runtime knobs that are never persisted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use armory_core::{ArmoryError, ArmoryResult, Category};
use armory_state::Snapshot;
use armory_transport::DEFAULT_LINK_CAPACITY;

use crate::{set_log_enabled, BatchReport, MessageAdapter};

/// Persisted registry configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Log changes to the registry
    pub log_changes: bool,
    pub allowed_swords: Vec<String>,
    pub allowed_weapons: Vec<String>,
    pub forbidden_swords: Vec<String>,
    pub forbidden_weapons: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            log_changes: true,
            allowed_swords: Vec::new(),
            allowed_weapons: Vec::new(),
            forbidden_swords: Vec::new(),
            forbidden_weapons: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Read a config file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> ArmoryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(RegistryConfig::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| ArmoryError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ArmoryError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> ArmoryResult<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ArmoryError::Config(e.to_string()))?;
        fs::write(path, json).map_err(|e| ArmoryError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Build a config holding the registry's current lists
    pub fn from_snapshot(snapshot: &Snapshot, log_changes: bool) -> Self {
        let strings = |category: Category| {
            snapshot
                .list(category)
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
        };
        RegistryConfig {
            log_changes,
            allowed_swords: strings(Category::AllowedSword),
            allowed_weapons: strings(Category::AllowedWeapon),
            forbidden_swords: strings(Category::ForbiddenSword),
            forbidden_weapons: strings(Category::ForbiddenWeapon),
        }
    }

    pub fn list(&self, category: Category) -> &[String] {
        match category {
            Category::AllowedSword => &self.allowed_swords,
            Category::AllowedWeapon => &self.allowed_weapons,
            Category::ForbiddenSword => &self.forbidden_swords,
            Category::ForbiddenWeapon => &self.forbidden_weapons,
        }
    }

    /// Every entry in category order
    pub fn entries(&self) -> impl Iterator<Item = (&str, Category)> {
        Category::ALL.into_iter().flat_map(move |category| {
            self.list(category)
                .iter()
                .map(move |raw| (raw.as_str(), category))
        })
    }

    /// Feed the lists to the registry with override, as `Config:<name>`
    ///
    /// With `log_changes` off, logging is switched off before loading.
    pub fn apply(&self, adapter: &MessageAdapter, name: &str) -> BatchReport {
        if !self.log_changes {
            info!("Registry change logging disabled by config");
            set_log_enabled(false);
        }
        adapter.register_batch(&format!("Config:{}", name), true, self.entries())
    }
}

/// Runtime settings for authority and replica nodes
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Frames queued per replica link before it is detached
    pub link_capacity: usize,
    /// Name used in the `Config:<name>` origin
    pub config_name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            link_capacity: DEFAULT_LINK_CAPACITY,
            config_name: "armory".to_string(),
        }
    }
}
