//! Discovery of agent definitions inside plugin directories.
//!
//! A plugin keeps its agents under `<plugin>/agents/`. When an `agents.yaml`
//! manifest is present it is the only source (`agents: [...]`); otherwise each
//! `*.yaml`/`*.yml` file in that directory holds one definition. Discovery
//! never fails: unreadable sources and invalid entries are skipped and
//! reported.

use super::definition::{module_file_candidates, AgentDefinition, EntryPoint};
use super::registry::AgentRegistry;
use crate::plugins::PluginRegistry;
use indexmap::IndexMap;
use serde_yaml::Value as YamlValue;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Directory inside a plugin holding agent definitions and scripts
pub const AGENTS_DIR: &str = "agents";
/// Manifest listing every agent of a plugin, inside [`AGENTS_DIR`]
pub const AGENTS_MANIFEST: &str = "agents.yaml";

/// A definition source that did not produce an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAgent {
    pub source: PathBuf,
    /// Position in the manifest's `agents` list, for manifest entries
    pub index: Option<usize>,
    pub reason: String,
}

impl fmt::Display for SkippedAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]: {}", self.source.display(), index, self.reason),
            None => write!(f, "{}: {}", self.source.display(), self.reason),
        }
    }
}

/// Agents found in a plugin together with what had to be skipped.
#[derive(Debug, Default)]
pub struct AgentLoad {
    pub agents: IndexMap<String, AgentDefinition>,
    pub skipped: Vec<SkippedAgent>,
}

impl AgentLoad {
    fn skip(&mut self, source: &Path, index: Option<usize>, reason: impl Into<String>) {
        self.skipped.push(SkippedAgent {
            source: source.to_path_buf(),
            index,
            reason: reason.into(),
        });
    }

    fn insert(&mut self, source: &Path, definition: AgentDefinition) {
        if self.agents.contains_key(&definition.name) {
            warn!(
                "Duplicate agent {} in {}, keeping the later definition",
                definition.name,
                source.display()
            );
        }
        self.agents.insert(definition.name.clone(), definition);
    }
}

/// Load every valid agent definition of a plugin, keyed by agent name.
pub fn load_plugin_agents(plugin_dir: &Path) -> IndexMap<String, AgentDefinition> {
    load_plugin_agents_with_report(plugin_dir).agents
}

/// Like [`load_plugin_agents`], also reporting what was skipped and why
pub fn load_plugin_agents_with_report(plugin_dir: &Path) -> AgentLoad {
    let mut load = AgentLoad::default();
    let agents_dir = plugin_dir.join(AGENTS_DIR);

    if !agents_dir.is_dir() {
        debug!("No agents directory in {}", plugin_dir.display());
        return load;
    }

    let manifest = agents_dir.join(AGENTS_MANIFEST);
    if manifest.is_file() {
        load_manifest(&manifest, &mut load);
    } else {
        load_definition_files(&agents_dir, &mut load);
    }

    for skipped in &load.skipped {
        warn!("Skipping agent definition {}", skipped);
    }
    debug!(
        "Loaded {} agents from {}",
        load.agents.len(),
        plugin_dir.display()
    );
    load
}

fn load_manifest(path: &Path, load: &mut AgentLoad) {
    let document: YamlValue = match read_yaml(path) {
        Ok(document) => document,
        Err(reason) => return load.skip(path, None, reason),
    };

    let entries = match document.get("agents") {
        Some(YamlValue::Sequence(entries)) => entries.clone(),
        Some(_) => return load.skip(path, None, "'agents' must be a list"),
        None => return load.skip(path, None, "no 'agents' list"),
    };

    for (index, entry) in entries.into_iter().enumerate() {
        match serde_yaml::from_value::<AgentDefinition>(entry) {
            Ok(definition) => load.insert(path, definition),
            Err(e) => load.skip(path, Some(index), e.to_string()),
        }
    }
}

fn load_definition_files(agents_dir: &Path, load: &mut AgentLoad) {
    let entries = match std::fs::read_dir(agents_dir) {
        Ok(entries) => entries,
        Err(e) => return load.skip(agents_dir, None, e.to_string()),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_definition_file(path))
        .collect();
    files.sort();

    for path in files {
        match read_yaml::<AgentDefinition>(&path) {
            Ok(definition) => load.insert(&path, definition),
            Err(reason) => load.skip(&path, None, reason),
        }
    }
}

fn is_definition_file(path: &Path) -> bool {
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    is_yaml && path.file_name().and_then(|name| name.to_str()) != Some(AGENTS_MANIFEST)
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_yaml::from_str(&contents).map_err(|e| e.to_string())
}

/// Check that a definition can run from `plugin_dir`. Returns the problems found.
pub fn validate_agent_definition(definition: &AgentDefinition, plugin_dir: &Path) -> Vec<String> {
    let mut errors: Vec<String> = definition
        .invariant_violations()
        .iter()
        .map(ToString::to_string)
        .collect();

    let agents_dir = plugin_dir.join(AGENTS_DIR);
    match definition.entry() {
        EntryPoint::Script { file, .. } => {
            let script = agents_dir.join(file);
            if !script.is_file() {
                errors.push(format!("Agent script not found: {}", script.display()));
            }
        }
        EntryPoint::Module { path } => {
            let candidates = module_file_candidates(&agents_dir, path);
            match candidates.first() {
                None => errors.push(format!("Invalid module entry point: '{}'", path)),
                Some(expected) if !candidates.iter().any(|c| c.is_file()) => {
                    errors.push(format!("Agent module not found: {}", expected.display()));
                }
                Some(_) => {}
            }
        }
    }

    errors
}

/// Load and register the agents of one plugin directory under `plugin`.
///
/// Validation problems are logged; the agents are registered regardless.
pub fn register_agents_from_dir(plugin: &str, plugin_dir: &Path, registry: &AgentRegistry) -> usize {
    let agents = load_plugin_agents(plugin_dir);
    let count = agents.len();

    for definition in agents.into_values() {
        for problem in validate_agent_definition(&definition, plugin_dir) {
            warn!("Agent {}/{}: {}", plugin, definition.name, problem);
        }
        registry.register_agent(plugin, definition);
    }

    count
}

/// Register the agents of every active plugin that declares agents.
pub fn register_plugin_agents(plugins: &PluginRegistry, registry: &AgentRegistry) -> usize {
    let mut total = 0;

    for plugin in plugins.active_plugins() {
        if !plugin.provides_agents() {
            continue;
        }

        let Some(install_path) = plugin.install_path.as_deref() else {
            debug!("Plugin {} has no install path", plugin.name());
            continue;
        };
        if !install_path.exists() {
            warn!(
                "Install path of plugin {} does not exist: {}",
                plugin.name(),
                install_path.display()
            );
            continue;
        }

        total += register_agents_from_dir(plugin.name(), install_path, registry);
    }

    info!("Registered {} plugin agents", total);
    total
}

/// Look up an agent by its `plugin/agent` key. The plugin must be active.
pub fn get_agent_by_key(
    key: &str,
    plugins: &PluginRegistry,
    registry: &AgentRegistry,
) -> Option<Arc<AgentDefinition>> {
    let (plugin, agent) = key.split_once('/')?;
    if plugin.is_empty() || agent.is_empty() || agent.contains('/') {
        return None;
    }

    if !plugins.get_plugin(plugin)?.is_active() {
        return None;
    }

    registry.get_agent(plugin, agent)
}
