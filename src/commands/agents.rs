use super::Catalog;
use crate::agents::executor::Interpreters;
use crate::agents::{
    get_agent_by_key, load_plugin_agents_with_report, validate_agent_definition, AgentCapability,
    AgentContext, AgentExecutor, AgentResponse, ExecuteOptions,
};
use crate::cli::{AgentCommands, RunCmd};
use crate::config::Config;
use crate::error::{Result, SetupError};
use serde_json::{Map, Value};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// How often a pending interrupt retries cancelling a run that has not started.
const CANCEL_RETRY: Duration = Duration::from_millis(50);

/// Dispatch an `agents` subcommand
pub async fn execute(command: &AgentCommands, config: &Config) -> Result<()> {
    match command {
        AgentCommands::List { plugin, capability } => {
            list(&Catalog::load(config)?, plugin.as_deref(), *capability)
        }
        AgentCommands::Show { key } => show(&Catalog::load(config)?, key),
        AgentCommands::Validate { plugin_dir } => validate(plugin_dir),
        AgentCommands::Run(cmd) => run(&Catalog::load(config)?, config, cmd).await,
    }
}

fn list(catalog: &Catalog, plugin: Option<&str>, capability: Option<AgentCapability>) -> Result<()> {
    let agents: Vec<_> = catalog
        .agents
        .all_agents()
        .into_iter()
        .filter(|(key, _)| match plugin {
            Some(plugin) => key.split_once('/').map(|(p, _)| p) == Some(plugin),
            None => true,
        })
        .filter(|(_, definition)| capability.map_or(true, |c| definition.has_capability(c)))
        .collect();

    if agents.is_empty() {
        println!("No agents found.");
        return Ok(());
    }

    println!("{:<40} {:<36} DESCRIPTION", "AGENT", "CAPABILITIES");
    println!("{}", "-".repeat(100));
    for (key, definition) in agents {
        let capabilities: Vec<_> = definition
            .capabilities
            .iter()
            .map(AgentCapability::as_str)
            .collect();
        println!(
            "{:<40} {:<36} {}",
            key,
            capabilities.join(","),
            definition.description
        );
    }

    Ok(())
}

fn show(catalog: &Catalog, key: &str) -> Result<()> {
    let definition = get_agent_by_key(key, &catalog.plugins, &catalog.agents)
        .ok_or_else(|| SetupError::UnknownAgent(key.to_string()))?;

    println!("# {}", key);
    print!("{}", serde_yaml::to_string(&*definition)?);
    Ok(())
}

fn validate(plugin_dir: &Path) -> Result<()> {
    let load = load_plugin_agents_with_report(plugin_dir);
    let mut problems = load.skipped.len();

    println!("Validating agents in {}...\n", plugin_dir.display());

    for skipped in &load.skipped {
        println!("  ✗ {}", skipped);
    }

    for (name, definition) in &load.agents {
        let errors = validate_agent_definition(definition, plugin_dir);
        if errors.is_empty() {
            println!("  ✓ {}", name);
        } else {
            println!("  ✗ {}", name);
            for error in &errors {
                println!("      {}", error);
            }
            problems += errors.len();
        }
    }

    if load.agents.is_empty() && load.skipped.is_empty() {
        println!("  No agent definitions found.");
    }

    if problems > 0 {
        return Err(SetupError::Validation(format!(
            "{} problem(s) in {}",
            problems,
            plugin_dir.display()
        )));
    }

    println!("\n✓ All agents are valid!");
    Ok(())
}

async fn run(catalog: &Catalog, config: &Config, cmd: &RunCmd) -> Result<()> {
    let definition = get_agent_by_key(&cmd.key, &catalog.plugins, &catalog.agents)
        .ok_or_else(|| SetupError::UnknownAgent(cmd.key.clone()))?;

    let plugin_name = cmd.key.split_once('/').map_or(cmd.key.as_str(), |(p, _)| p);
    let plugin_dir = catalog
        .plugins
        .get_plugin(plugin_name)
        .and_then(|plugin| plugin.install_path)
        .ok_or_else(|| SetupError::PluginNotFound(plugin_name.to_string()))?;

    let context = build_context(cmd)?;
    let agent_config = parse_agent_config(cmd.config_json.as_deref())?;
    let options = ExecuteOptions {
        stream: false,
        debug: cmd.debug || config.agents.debug_enabled(),
    };

    let executor = AgentExecutor::new(definition, plugin_dir)
        .with_interpreters(Interpreters::with_overrides(&config.interpreters));

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; never interrupt
            std::future::pending::<()>().await;
        }
    };
    let response =
        execute_interruptible(&executor, &context, &agent_config, options, interrupted).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if response.is_success() {
        Ok(())
    } else {
        Err(SetupError::AgentFailed {
            key: cmd.key.clone(),
            status: response.status.to_string(),
        })
    }
}

/// Run the agent, cancelling it once `interrupted` resolves.
///
/// An interrupt that arrives before the script is running is held until the
/// executor can act on it, so it is never lost.
async fn execute_interruptible(
    executor: &AgentExecutor,
    context: &AgentContext,
    config: &Map<String, Value>,
    options: ExecuteOptions,
    interrupted: impl Future<Output = ()>,
) -> AgentResponse {
    let execution = executor.execute(context, config, options);
    tokio::pin!(execution);

    tokio::select! {
        response = &mut execution => return response,
        () = interrupted => warn!("Interrupted, cancelling {}", executor.definition().name),
    }

    loop {
        if executor.cancel() {
            return execution.await;
        }
        tokio::select! {
            response = &mut execution => return response,
            () = tokio::time::sleep(CANCEL_RETRY) => {}
        }
    }
}

fn build_context(cmd: &RunCmd) -> Result<AgentContext> {
    let project = match &cmd.project {
        Some(project) => project.clone(),
        None => std::env::current_dir()?,
    };

    let mut context = AgentContext::new(project);
    if let Some(file) = &cmd.file {
        context = context.with_current_file(file.clone());
    }
    for var in &cmd.vars {
        let (key, value) = parse_var(var)?;
        context = context.with_variable(key, value);
    }
    Ok(context)
}

/// Parse `key=value`; the value is JSON when it parses as JSON, else a string.
fn parse_var(var: &str) -> Result<(String, Value)> {
    let (key, raw) = var
        .split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .ok_or_else(|| {
            SetupError::InvalidArgument(format!("expected KEY=VALUE, got '{}'", var))
        })?;

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}

fn parse_agent_config(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(object) => Ok(object),
        _ => Err(SetupError::InvalidArgument(
            "--config-json must be a JSON object".to_string(),
        )),
    }
}

fn print_response(response: &AgentResponse) {
    println!("Status: {}", response.status);
    if let Some(duration) = response.duration_seconds {
        println!("Duration: {:.2}s", duration);
    }

    for message in &response.messages {
        println!("\n[{}]\n{}", message.role, message.content);
    }

    if let Some(output) = response.output() {
        println!("\n{}", output);
    }

    let other_results: Map<String, Value> = response
        .results
        .iter()
        .filter(|(key, _)| key.as_str() != "output")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if !other_results.is_empty() {
        println!("\nResults:");
        for (key, value) in &other_results {
            println!("  {}: {}", key, value);
        }
    }

    if !response.artifacts.is_empty() {
        println!("\nArtifacts:");
        for name in response.artifacts.keys() {
            println!("  {}", name);
        }
    }

    if !response.errors.is_empty() {
        eprintln!("\nErrors:");
        for error in &response.errors {
            eprintln!("  {}", error);
        }
    }
}
