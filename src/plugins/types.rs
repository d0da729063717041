//! Plugin records as tracked by the plugin registry.
//!
//! Only the parts the agent subsystem reads are modelled here: identity,
//! status, install location and what the plugin declares it provides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, SetupError};

/// File name of a plugin's manifest inside its install directory.
pub const MANIFEST_FILE: &str = "plugin.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    #[default]
    Available,
    Installed,
    Active,
    Disabled,
    Error,
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginStatus::Available => "available",
            PluginStatus::Installed => "installed",
            PluginStatus::Active => "active",
            PluginStatus::Disabled => "disabled",
            PluginStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Names of the extensions a plugin ships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginCapabilities {
    #[serde(default)]
    pub templates: Vec<String>,

    #[serde(default)]
    pub hooks: Vec<String>,

    #[serde(default)]
    pub agents: Vec<String>,

    #[serde(default)]
    pub workflows: Vec<String>,

    #[serde(default)]
    pub commands: Vec<String>,
}

impl PluginCapabilities {
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
            && self.hooks.is_empty()
            && self.agents.is_empty()
            && self.workflows.is_empty()
            && self.commands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub display_name: String,
    pub version: semver::Version,
    pub description: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub category: String,
}

/// Parsed `plugin.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub metadata: PluginMetadata,

    #[serde(default)]
    pub provides: PluginCapabilities,
}

impl PluginManifest {
    /// Read a `plugin.yaml`
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| SetupError::yaml(path, e))
    }
}

/// A plugin known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub manifest: PluginManifest,

    #[serde(default)]
    pub status: PluginStatus,

    #[serde(default)]
    pub install_path: Option<PathBuf>,

    #[serde(default)]
    pub install_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub config: Map<String, Value>,

    #[serde(default)]
    pub errors: Vec<String>,
}

impl Plugin {
    pub fn new(manifest: PluginManifest, status: PluginStatus) -> Self {
        Self {
            manifest,
            status,
            install_path: None,
            install_date: None,
            config: Map::new(),
            errors: Vec::new(),
        }
    }

    /// Load a plugin from its directory, marking it active.
    ///
    /// Without a `plugin.yaml` the plugin is named after the directory and
    /// declares no capabilities.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            PluginManifest::from_file(&manifest_path)?
        } else {
            let name = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    SetupError::InvalidConfig(format!(
                        "cannot derive a plugin name from {}",
                        dir.display()
                    ))
                })?;
            PluginManifest {
                metadata: PluginMetadata {
                    display_name: name.clone(),
                    name,
                    version: semver::Version::new(0, 0, 0),
                    description: String::new(),
                    author: String::new(),
                    category: String::new(),
                },
                provides: PluginCapabilities::default(),
            }
        };

        let mut plugin = Self::new(manifest, PluginStatus::Active);
        plugin.install_path = Some(dir.to_path_buf());
        Ok(plugin)
    }

    pub fn with_install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    /// Get the plugin name from its manifest
    pub fn name(&self) -> &str {
        &self.manifest.metadata.name
    }

    /// Whether the plugin is enabled
    pub fn is_active(&self) -> bool {
        self.status == PluginStatus::Active
    }

    /// Whether the manifest declares at least one agent
    pub fn provides_agents(&self) -> bool {
        !self.manifest.provides.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
metadata:
  name: code-quality
  display_name: Code Quality
  version: 1.2.0
  description: Review and complexity agents
  author: Claude Setup Contributors
  category: quality
provides:
  agents: [code-reviewer, complexity-analyzer]
  hooks: [pre-commit-review]
"#;

    #[test]
    fn test_manifest_parsing() {
        let manifest: PluginManifest = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(manifest.metadata.name, "code-quality");
        assert_eq!(manifest.metadata.version, semver::Version::new(1, 2, 0));
        assert_eq!(manifest.provides.agents.len(), 2);
        assert!(manifest.provides.templates.is_empty());
        assert!(!manifest.provides.is_empty());
    }

    #[test]
    fn test_from_directory_marks_active() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), MANIFEST).unwrap();

        let plugin = Plugin::from_directory(dir.path()).unwrap();
        assert!(plugin.is_active());
        assert!(plugin.provides_agents());
        assert_eq!(plugin.install_path.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_from_directory_without_manifest() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("local-agents");
        std::fs::create_dir(&dir).unwrap();

        let plugin = Plugin::from_directory(&dir).unwrap();
        assert_eq!(plugin.name(), "local-agents");
        assert!(plugin.is_active());
        assert!(!plugin.provides_agents());
    }

    #[test]
    fn test_from_directory_with_broken_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "metadata: [").unwrap();
        assert!(Plugin::from_directory(dir.path()).is_err());
    }
}
