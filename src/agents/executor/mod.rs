//! Execution of a single agent definition.
//!
//! The entry point decides the strategy: script files run as a child process
//! fed the context on stdin, anything else is resolved to an in-process
//! [`AgentModule`] through a [`ModuleLoader`]. Both paths end in one
//! [`AgentResponse`]; failures never escape `execute` as errors or panics.

mod dylib;
mod module;
mod script;

pub use dylib::DylibLoader;
pub use module::{
    ready, AgentModule, AsyncModule, BlockingModule, ModuleLoader, ModuleOutput, ModuleTable,
};
pub use script::Interpreters;

use super::context::{AgentContext, AgentResponse};
use super::definition::{AgentDefinition, EntryPoint};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-call switches passed through to the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecuteOptions {
    pub stream: bool,
    pub debug: bool,
}

impl ExecuteOptions {
    /// Options with only the debug switch set
    pub fn debug(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }
}

/// Runs one agent definition, one call at a time.
pub struct AgentExecutor {
    definition: Arc<AgentDefinition>,
    plugin_dir: PathBuf,
    interpreters: Interpreters,
    modules: Arc<dyn ModuleLoader>,
    /// Cancellation handle of the running script, if any
    in_flight: Mutex<Option<CancellationToken>>,
    /// Serializes calls to `execute` on one executor
    running: tokio::sync::Mutex<()>,
}

impl AgentExecutor {
    /// Create an executor for one agent installed under `plugin_dir`
    pub fn new(definition: Arc<AgentDefinition>, plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            definition,
            plugin_dir: plugin_dir.into(),
            interpreters: Interpreters::default(),
            modules: Arc::new(DylibLoader),
            in_flight: Mutex::new(None),
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Use `interpreters` for script entry points
    pub fn with_interpreters(mut self, interpreters: Interpreters) -> Self {
        self.interpreters = interpreters;
        self
    }

    /// Resolve module entry points with `loader`
    pub fn with_module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.modules = loader;
        self
    }

    /// Get the definition this executor runs
    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Get the plugin directory scripts run in
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Run the agent once and return its settled response.
    ///
    /// The response is always terminal (`completed`, `failed` or `cancelled`)
    /// and carries `duration_seconds`. Concurrent calls on the same executor
    /// run one after the other.
    pub async fn execute(
        &self,
        context: &AgentContext,
        config: &Map<String, Value>,
        options: ExecuteOptions,
    ) -> AgentResponse {
        let _running = self.running.lock().await;
        let started = Instant::now();

        debug!(
            "Executing agent {} (entry point {})",
            self.definition.name, self.definition.entry_point
        );

        let mut response = match self.definition.entry() {
            EntryPoint::Script { file, extension } => {
                self.execute_script(file, extension, context, config, options)
                    .await
            }
            EntryPoint::Module { path } => {
                self.execute_module(path, context, config, options).await
            }
        };

        response.finish();
        response.duration_seconds = Some(started.elapsed().as_secs_f64());

        debug!(
            "Agent {} finished with status {} in {:.3}s",
            self.definition.name,
            response.status,
            started.elapsed().as_secs_f64()
        );
        response
    }

    /// Signal the running script to stop. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        match self.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                info!("Cancelled agent: {}", self.definition.name);
                true
            }
            None => false,
        }
    }

    fn timeout_message(&self) -> String {
        format!("Agent timed out after {}s", self.definition.timeout_seconds)
    }
}
