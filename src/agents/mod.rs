//! Plugin agents: definition, discovery, registration and execution.
//!
//! Plugins ship agents under `<plugin>/agents/`, described in YAML:
//!
//! ```yaml
//! name: code-reviewer
//! display_name: Code Reviewer
//! description: Reviews staged changes
//! capabilities: [code_review, security_analysis]
//! entry_point: code_reviewer.py
//! timeout_seconds: 120
//! ```
//!
//! The [`loader`] turns those files into [`AgentDefinition`]s and registers
//! them in an [`AgentRegistry`] under the plugin's name. An [`AgentExecutor`]
//! runs one definition, either as a script subprocess or as an in-process
//! module, and always returns an [`AgentResponse`].

pub mod context;
pub mod definition;
pub mod executor;
pub mod loader;
pub mod registry;

pub use context::{AgentContext, AgentMessage, AgentResponse, AgentStatus};
pub use definition::{AgentCapability, AgentDefinition, EntryPoint};
pub use executor::{AgentExecutor, ExecuteOptions, ModuleLoader, ModuleOutput};
pub use loader::{
    get_agent_by_key, load_plugin_agents, load_plugin_agents_with_report, register_plugin_agents,
    validate_agent_definition, AgentLoad, SkippedAgent,
};
pub use registry::{agent_key, AgentRegistry};
