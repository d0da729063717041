//! In-memory catalog of agents keyed by plugin namespace.

use super::definition::{AgentCapability, AgentDefinition};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

type PluginAgents = IndexMap<String, Arc<AgentDefinition>>;

/// Registry of agents provided by plugins.
///
/// One lock guards the whole `plugin -> (agent -> definition)` mapping, so no
/// reader ever sees a plugin's agent set half updated. Plugins and agents keep
/// their insertion order.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Mutex<IndexMap<String, PluginAgents>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under a plugin, replacing any agent with the same name.
    pub fn register_agent(&self, plugin: &str, definition: AgentDefinition) {
        self.register_shared(plugin, Arc::new(definition));
    }

    /// Register an already shared definition under `plugin`
    pub fn register_shared(&self, plugin: &str, definition: Arc<AgentDefinition>) {
        let mut agents = self.agents.lock();
        let plugin_agents = agents.entry(plugin.to_string()).or_default();

        let name = definition.name.clone();
        if plugin_agents.insert(name.clone(), definition).is_some() {
            warn!("Overwriting agent {}/{}", plugin, name);
        } else {
            debug!("Registered agent: {}/{}", plugin, name);
        }
    }

    /// Remove every agent of a plugin, returning how many were removed.
    pub fn unregister_plugin_agents(&self, plugin: &str) -> usize {
        let removed = self.agents.lock().shift_remove(plugin);
        match removed {
            Some(plugin_agents) => {
                info!(
                    "Unregistered {} agents from {}",
                    plugin_agents.len(),
                    plugin
                );
                plugin_agents.len()
            }
            None => 0,
        }
    }

    /// Get an agent by plugin and name
    pub fn get_agent(&self, plugin: &str, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents
            .lock()
            .get(plugin)
            .and_then(|plugin_agents| plugin_agents.get(name))
            .cloned()
    }

    /// List agent names for one plugin, or `plugin/agent` keys for all plugins.
    pub fn list_agents(&self, plugin: Option<&str>) -> Vec<String> {
        let agents = self.agents.lock();

        let mut keys: Vec<String> = match plugin {
            Some(plugin) => agents
                .get(plugin)
                .map(|plugin_agents| plugin_agents.keys().cloned().collect())
                .unwrap_or_default(),
            None => agents
                .iter()
                .flat_map(|(plugin, plugin_agents)| {
                    plugin_agents
                        .keys()
                        .map(move |name| agent_key(plugin, name))
                })
                .collect(),
        };

        keys.sort();
        keys
    }

    /// Agents declaring `capability`, in registration order.
    pub fn get_agents_by_capability(
        &self,
        capability: AgentCapability,
    ) -> Vec<Arc<AgentDefinition>> {
        self.agents
            .lock()
            .values()
            .flat_map(|plugin_agents| plugin_agents.values())
            .filter(|definition| definition.has_capability(capability))
            .cloned()
            .collect()
    }

    /// Every registered agent with its `plugin/agent` key, in registration order.
    pub fn all_agents(&self) -> Vec<(String, Arc<AgentDefinition>)> {
        self.agents
            .lock()
            .iter()
            .flat_map(|(plugin, plugin_agents)| {
                plugin_agents
                    .iter()
                    .map(move |(name, definition)| (agent_key(plugin, name), Arc::clone(definition)))
            })
            .collect()
    }

    /// Number of registered agents across all plugins
    pub fn len(&self) -> usize {
        self.agents.lock().values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The `plugin/agent` key used to address an agent across namespaces.
pub fn agent_key(plugin: &str, agent: &str) -> String {
    format!("{}/{}", plugin, agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, capabilities: &[AgentCapability]) -> AgentDefinition {
        AgentDefinition::builder(name, name, "test agent", format!("{}.py", name))
            .capabilities(capabilities.iter().copied())
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = AgentRegistry::new();
        registry.register_agent("code-quality", agent("reviewer", &[]));

        let found = registry.get_agent("code-quality", "reviewer").unwrap();
        assert_eq!(found.name, "reviewer");
        assert!(registry.get_agent("code-quality", "missing").is_none());
        assert!(registry.get_agent("missing", "reviewer").is_none());
    }

    #[test]
    fn test_register_overwrites_same_name() {
        let registry = AgentRegistry::new();
        registry.register_agent("p", agent("reviewer", &[]));
        let mut replacement = agent("reviewer", &[]);
        replacement.description = "second".to_string();
        registry.register_agent("p", replacement);

        assert_eq!(registry.list_agents(Some("p")), vec!["reviewer"]);
        assert_eq!(registry.get_agent("p", "reviewer").unwrap().description, "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_agents_keys() {
        let registry = AgentRegistry::new();
        registry.register_agent("beta", agent("tester", &[]));
        registry.register_agent("alpha", agent("reviewer", &[]));
        registry.register_agent("alpha", agent("documenter", &[]));

        assert_eq!(
            registry.list_agents(None),
            vec!["alpha/documenter", "alpha/reviewer", "beta/tester"]
        );
        assert_eq!(registry.list_agents(Some("alpha")), vec!["documenter", "reviewer"]);
        assert!(registry.list_agents(Some("gamma")).is_empty());
    }

    #[test]
    fn test_unregister_plugin_agents() {
        let registry = AgentRegistry::new();
        registry.register_agent("p", agent("a", &[]));
        registry.register_agent("p", agent("b", &[]));
        registry.register_agent("q", agent("c", &[]));

        assert_eq!(registry.unregister_plugin_agents("p"), 2);
        assert_eq!(registry.unregister_plugin_agents("p"), 0);
        assert_eq!(registry.unregister_plugin_agents("unknown"), 0);
        assert_eq!(registry.list_agents(None), vec!["q/c"]);
    }

    #[test]
    fn test_capability_search_keeps_registration_order() {
        let registry = AgentRegistry::new();
        registry.register_agent("p", agent("z-sec", &[AgentCapability::SecurityAnalysis]));
        registry.register_agent("p", agent("docs", &[AgentCapability::Documentation]));
        registry.register_agent(
            "q",
            agent(
                "a-sec",
                &[AgentCapability::CodeReview, AgentCapability::SecurityAnalysis],
            ),
        );

        let names: Vec<_> = registry
            .get_agents_by_capability(AgentCapability::SecurityAnalysis)
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(names, vec!["z-sec", "a-sec"]);
        assert!(registry
            .get_agents_by_capability(AgentCapability::Testing)
            .is_empty());
    }
}
