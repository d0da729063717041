//! Script strategy: run the entry point under an interpreter as a child process.

use super::{AgentExecutor, ExecuteOptions};
use crate::agents::context::{AgentContext, AgentResponse, AgentStatus};
use crate::agents::loader::AGENTS_DIR;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_INTERPRETERS: &[(&str, &str)] = &[
    ("py", "python3"),
    ("sh", "sh"),
    ("bash", "bash"),
    ("js", "node"),
    ("mjs", "node"),
    ("rb", "ruby"),
    ("pl", "perl"),
];

/// Command line used to run a script, keyed by file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreters {
    commands: BTreeMap<String, Vec<String>>,
}

impl Default for Interpreters {
    fn default() -> Self {
        let mut interpreters = Self {
            commands: BTreeMap::new(),
        };
        for (extension, command) in DEFAULT_INTERPRETERS {
            interpreters.set(extension, command);
        }
        interpreters
    }
}

impl Interpreters {
    /// Defaults with `overrides` applied on top.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut interpreters = Self::default();
        for (extension, command) in overrides {
            interpreters.set(extension, command);
        }
        interpreters
    }

    /// Set the command line for an extension. Arguments are split on whitespace;
    /// a blank command is ignored.
    pub fn set(&mut self, extension: &str, command: &str) {
        let words: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if !words.is_empty() {
            self.commands
                .insert(extension.trim_start_matches('.').to_string(), words);
        }
    }

    /// Get the command line for an extension
    pub fn command(&self, extension: &str) -> Option<&[String]> {
        self.commands.get(extension).map(Vec::as_slice)
    }
}

struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

enum Outcome {
    Finished(io::Result<Captured>),
    TimedOut,
    Cancelled,
}

impl AgentExecutor {
    pub(super) async fn execute_script(
        &self,
        file: &str,
        extension: &str,
        context: &AgentContext,
        config: &Map<String, Value>,
        options: ExecuteOptions,
    ) -> AgentResponse {
        let script = self.plugin_dir.join(AGENTS_DIR).join(file);
        let interpreter = self.interpreters.command(extension);
        let command_line = interpreter
            .map(|words| words.join(" "))
            .unwrap_or_else(|| "(none)".to_string());

        let fail = |summary: String, extra: Vec<(&'static str, String)>| {
            failed(summary, options.debug, || {
                let mut lines = vec![
                    ("script", script.display().to_string()),
                    ("interpreter", command_line.clone()),
                    ("timeout", format!("{}s", self.definition.timeout_seconds)),
                ];
                lines.extend(extra);
                diagnostics(&lines)
            })
        };

        if !script.is_file() {
            return fail(
                format!("Agent script not found: {}", script.display()),
                vec![("plugin directory", self.plugin_dir.display().to_string())],
            );
        }

        let Some((program, args)) = interpreter.and_then(<[String]>::split_first) else {
            return fail(
                format!("No interpreter configured for .{} scripts", extension),
                Vec::new(),
            );
        };

        let program_path = match which::which(program) {
            Ok(path) => path,
            Err(e) => {
                return fail(
                    format!("Interpreter '{}' not found in PATH", program),
                    vec![("lookup error", format!("{:?}", e))],
                )
            }
        };

        let mut command = Command::new(&program_path);
        command.args(args).arg(&script);
        if options.debug {
            command.arg("--debug");
        }
        command
            .current_dir(&self.plugin_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout or cancel reaches whatever the script started
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return fail(
                    format!("Execution error: failed to start {}: {}", program, e),
                    vec![("spawn error", format!("{:?}", e))],
                )
            }
        };
        debug!(
            "Spawned {} {} (pid {:?})",
            program,
            script.display(),
            child.id()
        );

        let token = CancellationToken::new();
        let mut in_flight = InFlight::register(&self.in_flight, token.clone(), child.id());

        let payload = json!({
            "context": context,
            "config": config,
            "agent": &*self.definition,
        })
        .to_string()
        .into_bytes();

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.definition.timeout(), communicate(&mut child, payload)) => {
                match result {
                    Ok(captured) => Outcome::Finished(captured),
                    Err(_) => Outcome::TimedOut,
                }
            }
            _ = token.cancelled() => Outcome::Cancelled,
        };

        in_flight.settle();

        match outcome {
            Outcome::TimedOut => {
                warn!(
                    "Agent {} exceeded {}s, killing it",
                    self.definition.name, self.definition.timeout_seconds
                );
                kill(&mut child).await;
                fail(
                    self.timeout_message(),
                    vec![("pid", format!("{:?}", in_flight.pid))],
                )
            }
            Outcome::Cancelled => {
                kill(&mut child).await;
                info!("Agent {} stopped after cancellation", self.definition.name);
                AgentResponse::new(AgentStatus::Cancelled)
            }
            Outcome::Finished(Err(e)) => {
                kill(&mut child).await;
                fail(
                    format!("Execution error: {}", e),
                    vec![("io error", format!("{:?}", e))],
                )
            }
            Outcome::Finished(Ok(captured)) => script_response(captured, options.debug),
        }
    }
}

/// Holds the cancellation token of a running script in the executor.
///
/// The slot is cleared when the run settles or when the `execute` future is
/// dropped mid-run; in the latter case the script's process group is killed.
struct InFlight<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    pid: Option<u32>,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn register(
        slot: &'a Mutex<Option<CancellationToken>>,
        token: CancellationToken,
        pid: Option<u32>,
    ) -> Self {
        *slot.lock() = Some(token);
        Self {
            slot,
            pid,
            settled: false,
        }
    }

    fn settle(&mut self) {
        self.slot.lock().take();
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.slot.lock().take();
            if let Some(pid) = self.pid {
                kill_group(pid);
            }
        }
    }
}

/// A failed response; debug mode adds `details` as a second error.
fn failed(summary: String, debug_mode: bool, details: impl FnOnce() -> String) -> AgentResponse {
    let mut response = AgentResponse::failed(summary);
    if debug_mode {
        response.errors.push(details());
    }
    response
}

fn diagnostics(lines: &[(&str, String)]) -> String {
    let mut text = String::from("Diagnostics:");
    for (label, value) in lines {
        text.push_str(&format!("\n{}: {}", label, value));
    }
    text
}

/// Feed stdin, then wait for exit while draining both output pipes.
async fn communicate(child: &mut Child, payload: Vec<u8>) -> io::Result<Captured> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let feed_and_wait = async {
        if let Some(mut stdin) = stdin {
            match stdin.write_all(&payload).await {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
        }
        child.wait().await
    };

    let (status, stdout, stderr) =
        tokio::join!(feed_and_wait, read_pipe(stdout), read_pipe(stderr));

    Ok(Captured {
        status: status?,
        stdout: stdout?,
        stderr: stderr?,
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<String> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer).await?;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Kill the child's process group, then kill and reap the child itself.
async fn kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_group(pid);
    }
    if let Err(e) = child.kill().await {
        if e.kind() != io::ErrorKind::InvalidInput {
            warn!("Failed to kill agent process: {}", e);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // Safety: killpg has no memory effects; the group was created for this
    // child at spawn and the child is not reaped yet, so the id is not reused.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(
            "killpg({}) failed: {}",
            pgid,
            io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

fn script_response(captured: Captured, debug_mode: bool) -> AgentResponse {
    let mut response = if !captured.status.success() {
        let stderr = captured.stderr.trim();
        AgentResponse::failed(format!(
            "Script failed ({}): {}",
            captured.status,
            if stderr.is_empty() {
                "(no stderr output)"
            } else {
                stderr
            }
        ))
    } else {
        match parse_output(&captured.stdout) {
            Ok(response) => response,
            Err(reason) => {
                let mut response = AgentResponse::failed(format!("Invalid output: {}", reason));
                if debug_mode {
                    response.metadata.insert(
                        "raw_output".to_string(),
                        Value::String(captured.stdout.clone()),
                    );
                }
                response
            }
        }
    };

    if debug_mode && !response.errors.is_empty() {
        response.errors.push(format!(
            "Diagnostics:\nexit status: {}\nstderr:\n{}\nstdout:\n{}",
            captured.status, captured.stderr, captured.stdout
        ));
    }

    response
}

fn parse_output(stdout: &str) -> Result<AgentResponse, String> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Err("agent produced no output".to_string());
    }

    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(object)) => AgentResponse::from_json_object(object),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}
