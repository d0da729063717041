pub mod agents;
pub mod config;

use crate::agents::{loader, AgentRegistry};
use crate::config::Config;
use crate::error::Result;
use crate::plugins::{Plugin, PluginRegistry};
use tracing::{debug, warn};

/// Plugins and their agents as seen by one command invocation.
pub struct Catalog {
    pub plugins: PluginRegistry,
    pub agents: AgentRegistry,
}

impl Catalog {
    /// Read the plugin registry, then add the configured plugin directories.
    pub fn load(config: &Config) -> Result<Self> {
        let registry_path = config.registry_path();
        let plugins = PluginRegistry::load(&registry_path)?;
        let agents = AgentRegistry::new();

        loader::register_plugin_agents(&plugins, &agents);

        for dir in config.plugin_directories() {
            if !dir.is_dir() {
                warn!("Plugin directory does not exist: {}", dir.display());
                continue;
            }
            let plugin = Plugin::from_directory(&dir)?;
            let name = plugin.name().to_string();
            plugins.register(plugin);

            let count = loader::register_agents_from_dir(&name, &dir, &agents);
            debug!("Registered {} agents from {}", count, dir.display());
        }

        Ok(Self { plugins, agents })
    }
}
