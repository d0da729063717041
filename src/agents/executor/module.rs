//! Module strategy: agents implemented in-process.
//!
//! A module is anything implementing [`AgentModule`]. Synchronous code either
//! returns [`ready`] or is wrapped in a [`BlockingModule`], which moves the call
//! onto tokio's blocking pool. Whatever the module returns is normalized into
//! an [`AgentResponse`] by [`ModuleOutput::into_response`].

use super::{AgentExecutor, ExecuteOptions};
use crate::agents::context::{AgentContext, AgentResponse};
use crate::error::ModuleLoadError;
use anyhow::anyhow;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// What a module call resolves to
pub type ModuleResult = anyhow::Result<ModuleOutput>;

/// What a module may hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleOutput {
    /// Used as is
    Response(AgentResponse),
    /// Read like the JSON object a script prints
    Map(Map<String, Value>),
    /// Stored under `results.output`
    Text(String),
}

impl ModuleOutput {
    /// Convert into a response, the way a script's stdout is read
    pub fn into_response(self) -> AgentResponse {
        match self {
            ModuleOutput::Response(response) => response,
            ModuleOutput::Map(object) => AgentResponse::from_json_object(object)
                .unwrap_or_else(|e| AgentResponse::failed(format!("Invalid output: {}", e))),
            ModuleOutput::Text(text) => AgentResponse::from_output(text),
        }
    }
}

impl From<AgentResponse> for ModuleOutput {
    fn from(response: AgentResponse) -> Self {
        ModuleOutput::Response(response)
    }
}

impl From<Map<String, Value>> for ModuleOutput {
    fn from(object: Map<String, Value>) -> Self {
        ModuleOutput::Map(object)
    }
}

impl From<String> for ModuleOutput {
    fn from(text: String) -> Self {
        ModuleOutput::Text(text)
    }
}

impl From<&str> for ModuleOutput {
    fn from(text: &str) -> Self {
        ModuleOutput::Text(text.to_string())
    }
}

impl From<Value> for ModuleOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(object) => ModuleOutput::Map(object),
            Value::String(text) => ModuleOutput::Text(text),
            other => ModuleOutput::Text(other.to_string()),
        }
    }
}

/// An agent implementation living in the host process.
pub trait AgentModule: Send + Sync {
    fn execute(
        &self,
        context: AgentContext,
        config: Map<String, Value>,
        options: ExecuteOptions,
    ) -> BoxFuture<'static, ModuleResult>;
}

/// Wrap an already computed result as a module future.
pub fn ready(result: ModuleResult) -> BoxFuture<'static, ModuleResult> {
    futures::future::ready(result).boxed()
}

/// Module backed by an async function.
pub struct AsyncModule<F> {
    func: F,
}

impl<F, Fut> AsyncModule<F>
where
    F: Fn(AgentContext, Map<String, Value>, ExecuteOptions) -> Fut + Send + Sync,
    Fut: Future<Output = ModuleResult> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> AgentModule for AsyncModule<F>
where
    F: Fn(AgentContext, Map<String, Value>, ExecuteOptions) -> Fut + Send + Sync,
    Fut: Future<Output = ModuleResult> + Send + 'static,
{
    fn execute(
        &self,
        context: AgentContext,
        config: Map<String, Value>,
        options: ExecuteOptions,
    ) -> BoxFuture<'static, ModuleResult> {
        (self.func)(context, config, options).boxed()
    }
}

/// Module backed by a blocking function, run on the blocking pool.
pub struct BlockingModule<F> {
    func: Arc<F>,
}

impl<F> BlockingModule<F>
where
    F: Fn(AgentContext, Map<String, Value>, ExecuteOptions) -> ModuleResult
        + Send
        + Sync
        + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
        }
    }
}

impl<F> AgentModule for BlockingModule<F>
where
    F: Fn(AgentContext, Map<String, Value>, ExecuteOptions) -> ModuleResult
        + Send
        + Sync
        + 'static,
{
    fn execute(
        &self,
        context: AgentContext,
        config: Map<String, Value>,
        options: ExecuteOptions,
    ) -> BoxFuture<'static, ModuleResult> {
        let func = Arc::clone(&self.func);
        async move {
            tokio::task::spawn_blocking(move || func(context, config, options))
                .await
                .map_err(join_error)?
        }
        .boxed()
    }
}

pub(super) fn join_error(error: tokio::task::JoinError) -> anyhow::Error {
    if error.is_panic() {
        anyhow!("agent panicked: {}", panic_message(&*error.into_panic()))
    } else {
        anyhow!("agent task was cancelled")
    }
}

pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Resolves a module entry point to a callable module.
pub trait ModuleLoader: Send + Sync {
    fn load(
        &self,
        plugin_dir: &Path,
        entry_point: &str,
    ) -> Result<Arc<dyn AgentModule>, ModuleLoadError>;
}

/// Modules compiled into the host, looked up by entry point.
#[derive(Default)]
pub struct ModuleTable {
    modules: RwLock<HashMap<String, Arc<dyn AgentModule>>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under `entry_point`, replacing any previous one
    pub fn register(&self, entry_point: &str, module: impl AgentModule + 'static) {
        self.modules
            .write()
            .insert(normalize_entry_point(entry_point), Arc::new(module));
    }

    /// Builder form of [`ModuleTable::register`]
    pub fn with(self, entry_point: &str, module: impl AgentModule + 'static) -> Self {
        self.register(entry_point, module);
        self
    }
}

impl ModuleLoader for ModuleTable {
    fn load(
        &self,
        _plugin_dir: &Path,
        entry_point: &str,
    ) -> Result<Arc<dyn AgentModule>, ModuleLoadError> {
        self.modules
            .read()
            .get(&normalize_entry_point(entry_point))
            .cloned()
            .ok_or_else(|| ModuleLoadError::NotFound(entry_point.to_string()))
    }
}

fn normalize_entry_point(entry_point: &str) -> String {
    entry_point.trim_start_matches(['.', '/']).to_string()
}

impl AgentExecutor {
    pub(super) async fn execute_module(
        &self,
        entry_point: &str,
        context: &AgentContext,
        config: &Map<String, Value>,
        options: ExecuteOptions,
    ) -> AgentResponse {
        let loaded = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.modules.load(&self.plugin_dir, entry_point)
        }));
        let module = match loaded {
            Ok(Ok(module)) => module,
            Ok(Err(e)) => return module_failure(anyhow::Error::new(e), options.debug),
            Err(payload) => return panic_failure(&*payload, options.debug),
        };
        debug!("Loaded agent module {}", entry_point);

        let started = std::panic::catch_unwind(AssertUnwindSafe(|| {
            module.execute(context.clone(), config.clone(), options)
        }));
        let call = match started {
            Ok(call) => AssertUnwindSafe(call).catch_unwind(),
            Err(payload) => return panic_failure(&*payload, options.debug),
        };

        match tokio::time::timeout(self.definition.timeout(), call).await {
            Err(_) => AgentResponse::failed(self.timeout_message()),
            Ok(Err(payload)) => panic_failure(&*payload, options.debug),
            Ok(Ok(Err(e))) => module_failure(e, options.debug),
            Ok(Ok(Ok(output))) => output.into_response(),
        }
    }
}

fn module_failure(error: anyhow::Error, debug_mode: bool) -> AgentResponse {
    let mut response = AgentResponse::failed(format!("Module execution error: {:#}", error));
    if debug_mode {
        response.errors.push(format!("{:?}", error));
    }
    response
}

fn panic_failure(payload: &(dyn Any + Send), debug_mode: bool) -> AgentResponse {
    let message = panic_message(payload);
    let mut response =
        AgentResponse::failed(format!("Module execution error: agent panicked: {}", message));
    if debug_mode {
        response.errors.push(format!("panic payload: {:?}", message));
    }
    response
}
