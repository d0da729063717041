//! Plugin registry as seen by the agent subsystem.
//!
//! The registry file is written by the plugin install commands; here it is only
//! read. Entries that fail to parse are skipped with a warning so one broken
//! record does not hide every other plugin.

use super::types::{Plugin, PluginStatus};
use crate::error::{Result, SetupError};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    plugins: Vec<Value>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Mutex<IndexMap<String, Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load plugins from a `registry.json` file. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        let registry = Self::new();
        if !path.exists() {
            debug!("Plugin registry not found at {}", path.display());
            return Ok(registry);
        }

        let contents = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&contents)
            .map_err(|e| SetupError::registry(path, e.to_string()))?;

        for entry in file.plugins {
            match serde_json::from_value::<Plugin>(entry) {
                Ok(plugin) => registry.register(plugin),
                Err(e) => warn!("Skipping invalid plugin entry in {}: {}", path.display(), e),
            }
        }

        debug!(
            "Loaded {} plugins from {}",
            registry.plugins.lock().len(),
            path.display()
        );
        Ok(registry)
    }

    /// Add or replace a plugin by name
    pub fn register(&self, plugin: Plugin) {
        self.plugins
            .lock()
            .insert(plugin.name().to_string(), plugin);
    }

    /// Get a plugin by name
    pub fn get_plugin(&self, name: &str) -> Option<Plugin> {
        self.plugins.lock().get(name).cloned()
    }

    /// Active plugins in registration order
    pub fn active_plugins(&self) -> Vec<Plugin> {
        self.plugins
            .lock()
            .values()
            .filter(|plugin| plugin.is_active())
            .cloned()
            .collect()
    }

    /// Change a plugin's status. Activation clears recorded errors.
    pub fn set_status(&self, name: &str, status: PluginStatus) -> Result<()> {
        let mut plugins = self.plugins.lock();
        let plugin = plugins
            .get_mut(name)
            .ok_or_else(|| SetupError::PluginNotFound(name.to_string()))?;

        plugin.status = status;
        if status == PluginStatus::Active {
            plugin.errors.clear();
        }
        debug!("Updated plugin {} status to {}", name, status);
        Ok(())
    }
}
