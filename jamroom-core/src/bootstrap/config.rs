//! Configuration loading

use anyhow::Result;
use std::path::Path;

use crate::Config;

const CONFIG_PATH_ENV: &str = "JAMROOM_CONFIG_PATH";
const CWD_CONFIG: &str = "config.yaml";

/// Pick the config file to load
///
/// Search order:
/// 1. explicit path (from the command line)
/// 2. `JAMROOM_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
///
/// Only paths that exist are returned.
#[must_use]
pub fn resolve_config_path(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .or_else(|| Some(CWD_CONFIG.to_string()))
        .filter(|p| Path::new(p).exists())
}

/// Load and validate configuration.
///
/// Runs before logging is initialized, so progress goes to stderr.
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    let config = match resolve_config_path(explicit) {
        Some(path) => {
            eprintln!("Loading config from {path}");
            Config::from_file(&path)?
        }
        None => {
            if let Some(path) = explicit {
                eprintln!("Config file {path} not found, using environment variables");
            }
            Config::from_env()?
        }
    };

    // Fail fast on misconfigurations
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}
