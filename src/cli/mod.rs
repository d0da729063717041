use crate::agents::AgentCapability;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration files
    Validate {
        /// Optional path to a specific config file to validate
        file: Option<PathBuf>,
    },

    /// Show effective configuration after merging all sources
    Show,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// List registered agents
    #[command(alias = "ls")]
    List {
        /// Only agents of this plugin
        #[arg(short = 'p', long)]
        plugin: Option<String>,

        /// Only agents declaring this capability (e.g. code_review)
        #[arg(short = 'c', long)]
        capability: Option<AgentCapability>,
    },

    /// Show an agent definition as YAML
    Show {
        /// Agent key in the form plugin/agent
        key: String,
    },

    /// Check the agent definitions of a plugin directory
    Validate {
        /// Plugin directory containing an agents/ folder
        plugin_dir: PathBuf,
    },

    /// Run an agent against a project
    Run(RunCmd),
}

#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Agent key in the form plugin/agent
    pub key: String,

    /// Project directory passed to the agent (default: current directory)
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// File the agent should focus on
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Context variable as key=value (value parsed as JSON when possible)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Agent configuration as a JSON object
    #[arg(long = "config-json", value_name = "JSON")]
    pub config_json: Option<String>,

    /// Run the agent in debug mode
    #[arg(long)]
    pub debug: bool,

    /// Print the full response as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(name = "claude-setup")]
#[command(about = "Load, inspect and run plugin agents", long_about = None)]
#[command(version = env!("CLAUDE_SETUP_VERSION"))]
#[command(after_help = "\
EXAMPLES:
  claude-setup agents list                        All registered agents
  claude-setup agents list -c security_analysis   Agents by capability
  claude-setup agents run code-quality/code-reviewer --file src/lib.rs
  claude-setup agents validate ./my-plugin        Check a plugin before installing

For details about a specific command, use:
  claude-setup <command> --help")]
pub struct Cli {
    /// Show debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Additional configuration file, applied after the project config
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Plugin registry file (overrides configuration)
    #[arg(long = "registry", global = true, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plugin agent commands
    #[command(alias = "agent")]
    Agents {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}
