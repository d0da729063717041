use crate::agents::definition::SCRIPT_EXTENSIONS;
use crate::error::{Result, SetupError};
use crate::utils::path::expand_or_keep;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of both the global (`~/`) and the project configuration.
pub const CONFIG_FILE: &str = ".claude-setup.toml";

/// Environment variable overriding the registry path
pub const REGISTRY_ENV: &str = "CLAUDE_SETUP_REGISTRY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    /// Script extension to interpreter command line, e.g. `py = "python3 -u"`
    #[serde(default)]
    pub interpreters: BTreeMap<String, String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Verbose mode (not stored in config file)
    #[serde(skip)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Plugin directories registered as active plugins in addition to the registry
    #[serde(default)]
    pub directories: Vec<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            directories: Vec::new(),
        }
    }
}

fn default_registry_path() -> String {
    "~/.claude/plugins/registry.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsConfig {
    /// Run agents in debug mode unless the command says otherwise.
    /// Unset means "inherit from a lower layer", ultimately false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

impl AgentsConfig {
    /// Effective debug switch
    pub fn debug_enabled(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration with precedence:
    /// 1. CLI flags (applied later via with_cli_overrides)
    /// 2. Environment variables
    /// 3. Explicit `--config` file
    /// 4. Project config (.claude-setup.toml in project root)
    /// 5. Global config (~/.claude-setup.toml)
    /// 6. Built-in defaults
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = home_dir() {
            let global_config = home.join(CONFIG_FILE);
            if global_config.exists() {
                config = config.merge(Self::from_file(&global_config)?);
            }
        }

        let project_config = project_root.join(CONFIG_FILE);
        if project_config.exists() {
            config = config.merge(Self::from_file(&project_config)?);
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(SetupError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            config = config.merge(Self::from_file(path)?);
        }

        config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(mut self, other: Self) -> Self {
        if other.plugins.registry_path != default_registry_path() {
            self.plugins.registry_path = other.plugins.registry_path;
        }
        // Directories (append)
        self.plugins.directories.extend(other.plugins.directories);

        if other.agents.debug.is_some() {
            self.agents.debug = other.agents.debug;
        }

        self.interpreters.extend(other.interpreters);

        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }

        self
    }

    /// Apply environment variable overrides
    fn merge_env(mut self) -> Self {
        if let Ok(path) = std::env::var(REGISTRY_ENV) {
            if !path.trim().is_empty() {
                self.plugins.registry_path = path;
            }
        }

        if let Ok(level) = std::env::var(crate::logging::LOG_ENV) {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }

        self
    }

    /// Apply CLI overrides (highest precedence)
    pub fn with_cli_overrides(mut self, verbose: bool, registry: Option<&Path>) -> Self {
        self.verbose = verbose;
        if let Some(registry) = registry {
            self.plugins.registry_path = registry.to_string_lossy().into_owned();
        }
        self
    }

    /// Check values serde cannot: interpreter keys and commands
    pub fn validate(&self) -> Result<()> {
        for (extension, command) in &self.interpreters {
            let extension = extension.trim_start_matches('.');
            if !SCRIPT_EXTENSIONS.contains(&extension) {
                return Err(SetupError::InvalidConfig(format!(
                    "[interpreters] '{}' is not a script extension (expected one of: {})",
                    extension,
                    SCRIPT_EXTENSIONS.join(", ")
                )));
            }
            if command.trim().is_empty() {
                return Err(SetupError::InvalidConfig(format!(
                    "[interpreters] command for '{}' is empty",
                    extension
                )));
            }
        }
        Ok(())
    }

    /// Registry file with `~` expanded.
    pub fn registry_path(&self) -> PathBuf {
        expand_or_keep(&self.plugins.registry_path)
    }

    /// Configured plugin directories with `~` expanded
    pub fn plugin_directories(&self) -> Vec<PathBuf> {
        self.plugins
            .directories
            .iter()
            .map(expand_or_keep)
            .collect()
    }
}

/// Get the home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.plugins.registry_path, "~/.claude/plugins/registry.json");
        assert!(config.plugins.directories.is_empty());
        assert!(!config.agents.debug_enabled());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
[agents]
debug = true

[interpreters]
py = "python3 -u"
"#,
        )
        .unwrap();

        assert_eq!(config.agents.debug, Some(true));
        assert_eq!(config.interpreters["py"], "python3 -u");
        assert_eq!(config.plugins.registry_path, default_registry_path());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_merge_config() {
        let mut base = Config::default();
        base.plugins.directories.push("/opt/a".to_string());
        base.interpreters.insert("py".to_string(), "python3".to_string());
        base.logging.level = "warn".to_string();

        let mut override_cfg = Config::default();
        override_cfg.plugins.registry_path = "/srv/registry.json".to_string();
        override_cfg.plugins.directories.push("/opt/b".to_string());
        override_cfg
            .interpreters
            .insert("py".to_string(), "pypy3".to_string());

        let merged = base.merge(override_cfg);
        assert_eq!(merged.plugins.registry_path, "/srv/registry.json");
        assert_eq!(merged.plugins.directories, vec!["/opt/a", "/opt/b"]);
        assert_eq!(merged.interpreters["py"], "pypy3");
        assert_eq!(merged.logging.level, "warn"); // Kept from base
    }

    #[test]
    fn test_merge_debug_flag_follows_precedence() {
        let mut global = Config::default();
        global.agents.debug = Some(true);

        let mut project = Config::default();
        project.agents.debug = Some(false);
        assert!(!global.clone().merge(project).agents.debug_enabled());

        // An unset layer keeps what lower layers decided
        assert!(global.merge(Config::default()).agents.debug_enabled());
    }

    #[test]
    #[serial]
    fn test_load_layers_project_and_env() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(
            home.path().join(CONFIG_FILE),
            "[logging]\nlevel = \"warn\"\n[plugins]\ndirectories = [\"~/plugins\"]\n",
        )
        .unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILE),
            "[plugins]\nregistry_path = \"/project/registry.json\"\n",
        )
        .unwrap();

        let original_home = std::env::var("HOME").ok();
        std::env::set_var("HOME", home.path());
        std::env::remove_var(REGISTRY_ENV);
        std::env::remove_var(crate::logging::LOG_ENV);

        let config = Config::load(project.path(), None).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.registry_path(), PathBuf::from("/project/registry.json"));
        assert_eq!(config.plugin_directories(), vec![home.path().join("plugins")]);

        std::env::set_var(REGISTRY_ENV, "/env/registry.json");
        let config = Config::load(project.path(), None).unwrap();
        assert_eq!(config.registry_path(), PathBuf::from("/env/registry.json"));
        std::env::remove_var(REGISTRY_ENV);

        match original_home {
            Some(original) => std::env::set_var("HOME", original),
            None => std::env::remove_var("HOME"),
        }
    }

    #[test]
    fn test_invalid_interpreter_extension() {
        let mut config = Config::default();
        config
            .interpreters
            .insert("exe".to_string(), "wine".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'exe'"));

        let mut config = Config::default();
        config.interpreters.insert("py".to_string(), " ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[agents\ndebug = true").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(SetupError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let config =
            Config::default().with_cli_overrides(true, Some(Path::new("/tmp/registry.json")));
        assert!(config.verbose);
        assert_eq!(config.registry_path(), PathBuf::from("/tmp/registry.json"));
    }
}
