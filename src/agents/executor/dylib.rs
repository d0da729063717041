//! Modules shipped as shared libraries under a plugin's `agents/` directory.
//!
//! A library exports two C functions:
//!
//! ```c
//! char *execute(const char *input);
//! void free_output(char *output);
//! ```
//!
//! `input` is a JSON object with `context`, `config`, `stream` and `debug`.
//! The returned string is read as a JSON object when it parses as one and as
//! raw text otherwise, then released with `free_output`.

use super::module::{join_error, AgentModule, ModuleLoader, ModuleOutput, ModuleResult};
use super::ExecuteOptions;
use crate::agents::context::AgentContext;
use crate::agents::definition::module_file_candidates;
use crate::agents::loader::AGENTS_DIR;
use crate::error::ModuleLoadError;
use anyhow::{bail, Context};
use futures::future::{BoxFuture, FutureExt};
use libloading::{Library, Symbol};
use serde_json::{json, Map, Value};
use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

type ExecuteFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type FreeOutputFn = unsafe extern "C" fn(*mut c_char);

const EXECUTE_SYMBOL: &[u8] = b"execute\0";
const FREE_OUTPUT_SYMBOL: &[u8] = b"free_output\0";

/// Loads `a.b` from `agents/a/b.<ext>` or `agents/a/b/mod.<ext>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl ModuleLoader for DylibLoader {
    fn load(
        &self,
        plugin_dir: &Path,
        entry_point: &str,
    ) -> Result<Arc<dyn AgentModule>, ModuleLoadError> {
        let candidates = module_file_candidates(&plugin_dir.join(AGENTS_DIR), entry_point);
        let path = candidates
            .iter()
            .find(|candidate| candidate.is_file())
            .cloned()
            .ok_or_else(|| {
                ModuleLoadError::NotFound(
                    candidates
                        .first()
                        .map(|expected| expected.display().to_string())
                        .unwrap_or_else(|| entry_point.to_string()),
                )
            })?;

        // Safety: the library comes from an installed plugin; its initializers
        // run with the privileges of this process.
        let library = unsafe { Library::new(&path) }.map_err(|source| ModuleLoadError::Library {
            path: path.clone(),
            source,
        })?;

        // Safety: the symbol is only checked for presence here.
        if unsafe { library.get::<ExecuteFn>(EXECUTE_SYMBOL) }.is_err() {
            return Err(ModuleLoadError::MissingExecute(entry_point.to_string()));
        }

        debug!("Loaded agent library {}", path.display());
        Ok(Arc::new(DylibModule {
            library: Arc::new(library),
            path,
        }))
    }
}

struct DylibModule {
    library: Arc<Library>,
    path: PathBuf,
}

impl AgentModule for DylibModule {
    fn execute(
        &self,
        context: AgentContext,
        config: Map<String, Value>,
        options: ExecuteOptions,
    ) -> BoxFuture<'static, ModuleResult> {
        let library = Arc::clone(&self.library);
        let path = self.path.clone();
        async move {
            let input = json!({
                "context": context,
                "config": config,
                "stream": options.stream,
                "debug": options.debug,
            })
            .to_string();

            tokio::task::spawn_blocking(move || call_library(&library, &path, &input))
                .await
                .map_err(join_error)?
        }
        .boxed()
    }
}

fn call_library(library: &Library, path: &Path, input: &str) -> ModuleResult {
    let input = CString::new(input).context("agent input contains a NUL byte")?;

    // Safety: `execute` follows the documented signature; the returned pointer
    // is a NUL-terminated string owned by the library until `free_output`.
    unsafe {
        let execute: Symbol<ExecuteFn> = library
            .get(EXECUTE_SYMBOL)
            .with_context(|| format!("{} has no 'execute' function", path.display()))?;

        let output = execute(input.as_ptr());
        if output.is_null() {
            bail!("{} returned no output", path.display());
        }

        let text = CStr::from_ptr(output).to_string_lossy().into_owned();
        match library.get::<FreeOutputFn>(FREE_OUTPUT_SYMBOL) {
            Ok(free_output) => free_output(output),
            Err(_) => warn!(
                "{} does not export free_output; its output is not released",
                path.display()
            ),
        }

        Ok(parse_output(text))
    }
}

fn parse_output(text: String) -> ModuleOutput {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => ModuleOutput::Map(object),
        _ => ModuleOutput::Text(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_output() {
        assert!(matches!(
            parse_output("{\"results\": {}}".to_string()),
            ModuleOutput::Map(_)
        ));
        assert_eq!(
            parse_output("[1]".to_string()),
            ModuleOutput::Text("[1]".to_string())
        );
        assert_eq!(
            parse_output("done".to_string()),
            ModuleOutput::Text("done".to_string())
        );
    }

    #[test]
    fn test_missing_library_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = DylibLoader.load(dir.path(), "review.core").err().unwrap();
        match err {
            ModuleLoadError::NotFound(expected) => assert!(expected.contains("review")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_library_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let agents = dir.path().join(AGENTS_DIR);
        std::fs::create_dir(&agents).unwrap();
        std::fs::write(
            agents.join(format!("broken.{}", std::env::consts::DLL_EXTENSION)),
            b"not a library",
        )
        .unwrap();

        let err = DylibLoader.load(dir.path(), "broken").err().unwrap();
        assert!(matches!(err, ModuleLoadError::Library { .. }));
    }
}
