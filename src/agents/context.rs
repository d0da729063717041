//! The contract shared by agent executions: what goes in (context) and what
//! comes out (response).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Execution status of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Initializing,
    Ready,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl AgentStatus {
    /// Whether a run in this status is over
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Failed | AgentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Initializing => "initializing",
            AgentStatus::Ready => "ready",
            AgentStatus::Running => "running",
            AgentStatus::Paused => "paused",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in an agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Free-form role label such as "user" or "assistant"
    pub role: String,

    pub content: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Per-invocation input handed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub project_path: PathBuf,

    #[serde(default)]
    pub current_file: Option<PathBuf>,

    #[serde(default)]
    pub selected_text: Option<String>,

    #[serde(default)]
    pub variables: Map<String, Value>,

    #[serde(default)]
    pub history: Vec<AgentMessage>,

    #[serde(default)]
    pub tools_available: Vec<String>,
}

impl AgentContext {
    /// Context for a run against `project_path`
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            current_file: None,
            selected_text: None,
            variables: Map::new(),
            history: Vec::new(),
            tools_available: Vec::new(),
        }
    }

    pub fn with_current_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.current_file = Some(file.into());
        self
    }

    pub fn with_selected_text(mut self, text: impl Into<String>) -> Self {
        self.selected_text = Some(text.into());
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_message(mut self, message: AgentMessage) -> Self {
        self.history.push(message);
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools_available.extend(tools.into_iter().map(Into::into));
        self
    }
}

/// Error recorded when an agent reports `failed` without saying why.
pub const UNEXPLAINED_FAILURE: &str = "Agent reported failure without details";

/// Outcome of one agent execution.
///
/// A non-empty `errors` list always comes with [`AgentStatus::Failed`] once the
/// executor has returned the response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    pub status: AgentStatus,

    #[serde(default)]
    pub messages: Vec<AgentMessage>,

    #[serde(default)]
    pub results: Map<String, Value>,

    /// Named text blobs produced as side output
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

/// Response shape accepted from scripts and module mappings.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    status: Option<AgentStatus>,
    #[serde(default)]
    messages: Vec<AgentMessage>,
    #[serde(default)]
    results: Map<String, Value>,
    #[serde(default)]
    artifacts: BTreeMap<String, String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl AgentResponse {
    pub fn new(status: AgentStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A failed response carrying one error
    pub fn failed(error: impl Into<String>) -> Self {
        let mut response = Self::new(AgentStatus::Failed);
        response.errors.push(error.into());
        response
    }

    /// A completed response carrying raw text under `results.output`.
    pub fn from_output(output: impl Into<String>) -> Self {
        let mut response = Self::new(AgentStatus::Completed);
        response
            .results
            .insert("output".to_string(), Value::String(output.into()));
        response
    }

    /// Interpret a JSON object as a response.
    ///
    /// Recognized keys are `status`, `messages`, `results`, `errors`,
    /// `artifacts` and `metadata`; anything else is ignored. A missing status
    /// means the agent completed.
    pub fn from_json_object(object: Map<String, Value>) -> Result<Self, String> {
        let wire: WireResponse =
            serde_json::from_value(Value::Object(object)).map_err(|e| e.to_string())?;

        Ok(Self {
            status: wire.status.unwrap_or(AgentStatus::Completed),
            messages: wire.messages,
            results: wire.results,
            artifacts: wire.artifacts,
            errors: wire.errors,
            metadata: wire.metadata,
            duration_seconds: None,
        })
    }

    /// Record an error and mark the run failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.status = AgentStatus::Failed;
    }

    /// Completed without errors
    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Completed && self.errors.is_empty()
    }

    /// Get the raw text output stored under `results.output`
    pub fn output(&self) -> Option<&str> {
        self.results.get("output").and_then(Value::as_str)
    }

    /// Settle into a terminal state.
    ///
    /// Errors force `failed`; a non-terminal status reported by the agent
    /// becomes `completed` and is kept under `metadata.reported_status`.
    /// A `failed` response always ends with at least one error.
    pub fn finish(&mut self) {
        if self.status == AgentStatus::Failed && self.errors.is_empty() {
            self.errors.push(UNEXPLAINED_FAILURE.to_string());
            return;
        }

        if !self.errors.is_empty() {
            if self.status != AgentStatus::Failed {
                self.record_reported_status();
                self.status = AgentStatus::Failed;
            }
            return;
        }

        if !self.status.is_terminal() {
            self.record_reported_status();
            self.status = AgentStatus::Completed;
        }
    }

    fn record_reported_status(&mut self) {
        let reported = self.status.as_str().to_string();
        self.metadata
            .entry("reported_status")
            .or_insert(Value::String(reported));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(AgentStatus::Completed.is_terminal());
        assert!(AgentStatus::Failed.is_terminal());
        assert!(AgentStatus::Cancelled.is_terminal());
        assert!(!AgentStatus::Running.is_terminal());
        assert!(!AgentStatus::Idle.is_terminal());
    }

    #[test]
    fn test_from_json_object_defaults_to_completed() {
        let response = AgentResponse::from_json_object(object(json!({
            "messages": [{"role": "assistant", "content": "done"}],
            "results": {"issues": 3},
            "artifacts": {"report.md": "# Report"},
            "unrelated": true
        })))
        .unwrap();

        assert_eq!(response.status, AgentStatus::Completed);
        assert_eq!(response.messages[0].content, "done");
        assert!(response.messages[0].metadata.is_empty());
        assert_eq!(response.results["issues"], json!(3));
        assert_eq!(response.artifacts["report.md"], "# Report");
        assert_eq!(response.duration_seconds, None);
    }

    #[test]
    fn test_from_json_object_rejects_bad_shapes() {
        assert!(AgentResponse::from_json_object(object(json!({"status": "exploded"}))).is_err());
        assert!(AgentResponse::from_json_object(object(json!({"errors": "not a list"}))).is_err());
        assert!(
            AgentResponse::from_json_object(object(json!({"messages": [{"role": "user"}]})))
                .is_err()
        );
    }

    #[test]
    fn test_finish_forces_failed_when_errors_present() {
        let mut response = AgentResponse::new(AgentStatus::Completed);
        response.errors.push("lint crashed".to_string());
        response.finish();
        assert_eq!(response.status, AgentStatus::Failed);
        assert_eq!(response.metadata["reported_status"], json!("completed"));
    }

    #[test]
    fn test_finish_gives_bare_failure_a_reason() {
        let mut response = AgentResponse::new(AgentStatus::Failed);
        response.finish();
        assert_eq!(response.status, AgentStatus::Failed);
        assert_eq!(response.errors, vec![UNEXPLAINED_FAILURE]);

        let mut explained = AgentResponse::failed("disk full");
        explained.finish();
        assert_eq!(explained.errors, vec!["disk full"]);
    }

    #[test]
    fn test_finish_settles_non_terminal_status() {
        let mut response = AgentResponse::new(AgentStatus::Running);
        response.finish();
        assert_eq!(response.status, AgentStatus::Completed);
        assert_eq!(response.metadata["reported_status"], json!("running"));

        let mut cancelled = AgentResponse::new(AgentStatus::Cancelled);
        cancelled.finish();
        assert_eq!(cancelled.status, AgentStatus::Cancelled);
        assert!(cancelled.metadata.is_empty());
    }

    #[test]
    fn test_from_output() {
        let response = AgentResponse::from_output("hello");
        assert_eq!(response.status, AgentStatus::Completed);
        assert_eq!(response.output(), Some("hello"));
        assert!(response.is_success());
    }

    #[test]
    fn test_context_serializes_all_fields() {
        let context = AgentContext::new("/work/project")
            .with_current_file("src/main.rs")
            .with_selected_text("fn main() {}")
            .with_variable("strict", true)
            .with_message(AgentMessage::user("review this"))
            .with_tools(["Read", "Grep"]);

        let value = serde_json::to_value(&context).unwrap();
        assert_eq!(value["project_path"], json!("/work/project"));
        assert_eq!(value["current_file"], json!("src/main.rs"));
        assert_eq!(value["variables"]["strict"], json!(true));
        assert_eq!(value["history"][0]["role"], json!("user"));
        assert_eq!(value["tools_available"], json!(["Read", "Grep"]));
    }
}
