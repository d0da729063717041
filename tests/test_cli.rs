use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A throwaway HOME holding a registry with one active plugin, `quality`.
struct Workspace {
    home: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let home = TempDir::new().unwrap();
        let plugin_dir = home.path().join("plugins").join("quality");
        let agents = plugin_dir.join("agents");
        fs::create_dir_all(&agents).unwrap();

        fs::write(
            agents.join("reviewer.yaml"),
            "name: reviewer\ndisplay_name: Code Reviewer\ndescription: Reviews code\ncapabilities: [code_review]\nentry_point: reviewer.sh\ntimeout_seconds: 30\n",
        )
        .unwrap();
        fs::write(
            agents.join("reviewer.sh"),
            "cat > /dev/null\necho '{\"results\": {\"issues\": 0}}'\n",
        )
        .unwrap();

        fs::write(
            agents.join("broken.yaml"),
            "name: broken\ndisplay_name: Broken\ndescription: Always fails\ncapabilities: [testing]\nentry_point: broken.sh\n",
        )
        .unwrap();
        fs::write(agents.join("broken.sh"), "echo 'tests exploded' >&2\nexit 2\n").unwrap();

        let registry = json!({
            "plugins": [{
                "manifest": {
                    "metadata": {
                        "name": "quality",
                        "display_name": "Quality",
                        "version": "1.0.0",
                        "description": "Quality agents"
                    },
                    "provides": {"agents": ["reviewer", "broken"]}
                },
                "status": "active",
                "install_path": plugin_dir,
            }]
        });
        fs::write(
            home.path().join("registry.json"),
            serde_json::to_string_pretty(&registry).unwrap(),
        )
        .unwrap();

        Self { home }
    }

    fn path(&self) -> &Path {
        self.home.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("claude-setup"));
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("CLAUDE_SETUP_REGISTRY", self.path().join("registry.json"))
            .env_remove("RUST_LOG")
            .env_remove("CLAUDE_SETUP_LOG");
        cmd
    }
}

#[test]
fn test_help_and_version() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Load, inspect and run plugin agents"));

    workspace
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("claude-setup "));
}

#[test]
fn test_agents_list() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["agents", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quality/reviewer"))
        .stdout(predicate::str::contains("quality/broken"));

    workspace
        .cmd()
        .args(["agents", "list", "--capability", "testing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quality/broken"))
        .stdout(predicate::str::contains("quality/reviewer").not());
}

#[test]
fn test_agents_list_empty_registry() {
    let workspace = Workspace::new();
    workspace
        .cmd()
        .env("CLAUDE_SETUP_REGISTRY", workspace.path().join("missing.json"))
        .args(["agents", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No agents found."));
}

#[test]
fn test_agents_show() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["agents", "show", "quality/reviewer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("entry_point: reviewer.sh"));

    workspace
        .cmd()
        .args(["agents", "show", "quality/nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown agent"));
}

#[test]
fn test_agents_validate() {
    let workspace = Workspace::new();
    let plugin_dir = workspace.path().join("plugins").join("quality");

    workspace
        .cmd()
        .args(["agents", "validate"])
        .arg(&plugin_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("All agents are valid"));

    fs::remove_file(plugin_dir.join("agents").join("broken.sh")).unwrap();
    workspace
        .cmd()
        .args(["agents", "validate"])
        .arg(&plugin_dir)
        .assert()
        .failure()
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn test_agents_run() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["agents", "run", "quality/reviewer", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"completed\""))
        .stdout(predicate::str::contains("\"issues\": 0"));

    workspace
        .cmd()
        .args(["agents", "run", "quality/broken"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Status: failed"))
        .stderr(predicate::str::contains("tests exploded"));
}

#[test]
fn test_config_show_and_validate() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[plugins]"));

    fs::write(
        workspace.path().join(".claude-setup.toml"),
        "[interpreters]\nexe = \"wine\"\n",
    )
    .unwrap();
    workspace
        .cmd()
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Configuration is invalid"));
}
