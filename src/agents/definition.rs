//! Data structures for agent definitions declared by plugins.
//!
//! Definitions are validated when they are built: every construction path
//! (the builder, YAML and JSON deserialization) rejects an empty name, a
//! `max_iterations` below 1 and a non-positive `timeout_seconds`.

use crate::error::DefinitionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::env::consts::DLL_EXTENSION;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Iteration budget when a definition does not set one
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
/// Timeout when a definition does not set one
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// File extensions that make an entry point run as a subprocess.
pub const SCRIPT_EXTENSIONS: &[&str] = &["py", "sh", "bash", "js", "mjs", "rb", "pl"];

/// What kind of task an agent performs. Used for discovery only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapability {
    CodeReview,
    CodeGeneration,
    Documentation,
    Testing,
    Refactoring,
    SecurityAnalysis,
    PerformanceAnalysis,
    DependencyAnalysis,
    ArchitectureReview,
    General,
}

impl AgentCapability {
    pub const ALL: [AgentCapability; 10] = [
        AgentCapability::CodeReview,
        AgentCapability::CodeGeneration,
        AgentCapability::Documentation,
        AgentCapability::Testing,
        AgentCapability::Refactoring,
        AgentCapability::SecurityAnalysis,
        AgentCapability::PerformanceAnalysis,
        AgentCapability::DependencyAnalysis,
        AgentCapability::ArchitectureReview,
        AgentCapability::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentCapability::CodeReview => "code_review",
            AgentCapability::CodeGeneration => "code_generation",
            AgentCapability::Documentation => "documentation",
            AgentCapability::Testing => "testing",
            AgentCapability::Refactoring => "refactoring",
            AgentCapability::SecurityAnalysis => "security_analysis",
            AgentCapability::PerformanceAnalysis => "performance_analysis",
            AgentCapability::DependencyAnalysis => "dependency_analysis",
            AgentCapability::ArchitectureReview => "architecture_review",
            AgentCapability::General => "general",
        }
    }
}

impl fmt::Display for AgentCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentCapability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|cap| cap.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown capability '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// An agent definition loaded from a plugin's `agents/` directory.
///
/// Fields are public so callers can inspect them freely; once a definition is
/// handed to the [`AgentRegistry`](super::registry::AgentRegistry) it is shared
/// behind an `Arc` and no longer mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAgentDefinition")]
pub struct AgentDefinition {
    /// Identifier, unique within a plugin namespace
    pub name: String,

    pub display_name: String,

    pub description: String,

    pub capabilities: Vec<AgentCapability>,

    /// Script file (run as a subprocess) or dotted module path (run in-process)
    pub entry_point: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Advisory iteration cap for callers; the executor does not enforce it
    pub max_iterations: u32,

    /// Hard wall-clock limit enforced by the executor
    pub timeout_seconds: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires_tools: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<BTreeMap<String, String>>,
}

/// Wire shape of a definition before its invariants are checked.
#[derive(Debug, Clone, Deserialize)]
struct RawAgentDefinition {
    name: String,
    display_name: String,
    description: String,
    capabilities: Vec<AgentCapability>,
    entry_point: String,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    max_iterations: Option<i64>,
    #[serde(default)]
    timeout_seconds: Option<i64>,
    #[serde(default)]
    config_schema: Option<Map<String, Value>>,
    #[serde(default)]
    requires_tools: Vec<String>,
    #[serde(default)]
    examples: Vec<BTreeMap<String, String>>,
}

impl TryFrom<RawAgentDefinition> for AgentDefinition {
    type Error = DefinitionError;

    fn try_from(raw: RawAgentDefinition) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        let max_iterations = match raw.max_iterations {
            None => DEFAULT_MAX_ITERATIONS,
            Some(n) => u32::try_from(n)
                .ok()
                .filter(|n| *n >= 1)
                .ok_or(DefinitionError::MaxIterations(n))?,
        };

        let timeout_seconds = match raw.timeout_seconds {
            None => DEFAULT_TIMEOUT_SECONDS,
            Some(n) => u64::try_from(n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or(DefinitionError::Timeout(n))?,
        };

        Ok(Self {
            name: raw.name,
            display_name: raw.display_name,
            description: raw.description,
            capabilities: raw.capabilities,
            entry_point: raw.entry_point,
            system_prompt: raw.system_prompt,
            max_iterations,
            timeout_seconds,
            config_schema: raw.config_schema,
            requires_tools: raw.requires_tools,
            examples: raw.examples,
        })
    }
}

impl AgentDefinition {
    /// Start building a definition from its required fields.
    pub fn builder(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> AgentDefinitionBuilder {
        AgentDefinitionBuilder {
            raw: RawAgentDefinition {
                name: name.into(),
                display_name: display_name.into(),
                description: description.into(),
                capabilities: Vec::new(),
                entry_point: entry_point.into(),
                system_prompt: None,
                max_iterations: None,
                timeout_seconds: None,
                config_schema: None,
                requires_tools: Vec::new(),
                examples: Vec::new(),
            },
        }
    }

    /// Parse a definition from a JSON object, checking invariants.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Check whether the agent declares `capability`
    pub fn has_capability(&self, capability: AgentCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Classify the entry point as script or module
    pub fn entry(&self) -> EntryPoint<'_> {
        EntryPoint::parse(&self.entry_point)
    }

    /// Execution deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Invariant violations of an already-built value.
    ///
    /// Empty for anything produced by the builder or by deserialization; only a
    /// struct assembled field by field can violate them.
    pub fn invariant_violations(&self) -> Vec<DefinitionError> {
        let mut violations = Vec::new();
        if self.name.trim().is_empty() {
            violations.push(DefinitionError::EmptyName);
        }
        if self.max_iterations < 1 {
            violations.push(DefinitionError::MaxIterations(i64::from(self.max_iterations)));
        }
        if self.timeout_seconds == 0 {
            violations.push(DefinitionError::Timeout(0));
        }
        violations
    }
}

/// Builder returned by [`AgentDefinition::builder`].
pub struct AgentDefinitionBuilder {
    raw: RawAgentDefinition,
}

impl AgentDefinitionBuilder {
    pub fn capability(mut self, capability: AgentCapability) -> Self {
        self.raw.capabilities.push(capability);
        self
    }

    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = AgentCapability>) -> Self {
        self.raw.capabilities.extend(capabilities);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.raw.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_iterations(mut self, max_iterations: i64) -> Self {
        self.raw.max_iterations = Some(max_iterations);
        self
    }

    pub fn timeout_seconds(mut self, timeout_seconds: i64) -> Self {
        self.raw.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn config_schema(mut self, schema: Map<String, Value>) -> Self {
        self.raw.config_schema = Some(schema);
        self
    }

    pub fn requires_tool(mut self, tool: impl Into<String>) -> Self {
        self.raw.requires_tools.push(tool.into());
        self
    }

    pub fn example(mut self, example: BTreeMap<String, String>) -> Self {
        self.raw.examples.push(example);
        self
    }

    /// Build the definition, enforcing its invariants
    pub fn build(self) -> Result<AgentDefinition, DefinitionError> {
        AgentDefinition::try_from(self.raw)
    }
}

/// How an entry point is executed, decided by its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint<'a> {
    /// A script file run by the interpreter registered for `extension`
    Script { file: &'a str, extension: &'a str },
    /// A bare or dotted module reference loaded in-process
    Module { path: &'a str },
}

impl<'a> EntryPoint<'a> {
    /// Classify an entry point by its file extension
    pub fn parse(entry_point: &'a str) -> Self {
        match entry_point.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() && SCRIPT_EXTENSIONS.contains(&extension) => {
                EntryPoint::Script {
                    file: entry_point,
                    extension,
                }
            }
            _ => EntryPoint::Module { path: entry_point },
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, EntryPoint::Script { .. })
    }
}

/// Relative path of a module reference: `review.core` becomes `review/core`.
///
/// Leading dots and slashes are ignored, so `.review.core` resolves the same way.
pub fn module_relative_path(module: &str) -> PathBuf {
    module
        .split(['.', '/'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Files a module reference may resolve to under `agents_dir`, in lookup
/// order: `a/b.<dylib ext>` then the package index `a/b/mod.<dylib ext>`.
pub fn module_file_candidates(agents_dir: &Path, module: &str) -> Vec<PathBuf> {
    let relative = module_relative_path(module);
    if relative.as_os_str().is_empty() {
        return Vec::new();
    }

    let base = agents_dir.join(relative);
    vec![
        base.with_extension(DLL_EXTENSION),
        base.join(format!("mod.{}", DLL_EXTENSION)),
    ]
}
