//! TOML configuration file parsing

use super::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<RunConfig> {
    let config: RunConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Render a configuration as TOML (used by `--dry-run -v`)
pub fn to_toml_string(config: &RunConfig) -> Result<String> {
    ::toml::to_string_pretty(config).context("Failed to serialize configuration")
}
