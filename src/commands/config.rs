use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Validate one config file, or every layer when none is given
pub fn validate(project_root: &Path, file: Option<&Path>) -> Result<()> {
    if let Some(file) = file {
        println!("Validating {}...", file.display());
        return report(Config::from_file(file).and_then(|config| config.validate()));
    }

    let project_config = project_root.join(CONFIG_FILE);
    let global_config = std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from("~").join(CONFIG_FILE));

    println!("Validating configuration files...\n");

    for (label, path) in [("Global", &global_config), ("Project", &project_config)] {
        if path.exists() {
            println!("  {} config: {}", label, path.display());
        } else {
            println!("  {} config: {} - not found (optional)", label, path.display());
        }
    }

    println!("\nLoading and validating configuration...");
    report(Config::load(project_root, None).map(|_| ()))
}

fn report(result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => {
            println!("✓ Configuration is valid!");
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration is invalid!");
            println!("  Error: {}", e);
            Err(e)
        }
    }
}

/// Print the effective configuration as TOML
pub fn show(config: &Config) -> Result<()> {
    println!("# Effective configuration");
    println!("# (CLI > Environment > Project config > Global config > Defaults)");
    println!("# registry file: {}", config.registry_path().display());
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
