// Configuration file parser

//! Configuration file parsing and validation
//!
//! This module handles loading the optional TOML configuration file,
//! merging it with command-line overrides, and validating the result.
//! Interface and module names end up as process arguments and bus call
//! parameters, so they are restricted to a safe character set.

use crate::types::{default_command_timeout, default_log_level, Config, GeneralConfig, Settings};
use crate::types::{DEFAULT_INTERFACE, DEFAULT_MODULE};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
    parse_config(&contents)
}

/// Parse configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).context("Failed to parse config file")
}

/// Merge command-line overrides over the config file and built-in defaults
///
/// A value given on the command line wins over the file, which wins over
/// the default.
pub fn resolve_settings(file: Config, cli: GeneralConfig) -> Result<Settings> {
    let file = file.general;

    let settings = Settings {
        interface: cli
            .interface
            .or(file.interface)
            .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
        module: cli
            .module
            .or(file.module)
            .unwrap_or_else(|| DEFAULT_MODULE.to_string()),
        command_timeout: Duration::from_secs(
            cli.command_timeout
                .or(file.command_timeout)
                .unwrap_or_else(default_command_timeout),
        ),
        on_interrupt: cli.on_interrupt.or(file.on_interrupt).unwrap_or_default(),
        log_level: cli
            .log_level
            .or(file.log_level)
            .unwrap_or_else(default_log_level),
    };

    validate_settings(&settings)?;
    Ok(settings)
}

/// Validate configuration values
fn validate_settings(settings: &Settings) -> Result<()> {
    validate_name(&settings.interface, "Interface name")?;
    validate_name(&settings.module, "Module name")?;

    if settings.command_timeout.is_zero() {
        anyhow::bail!("command_timeout must be > 0");
    }

    Ok(())
}

/// Validates that a name is safe to hand to rmmod/modprobe or wpa_supplicant.
/// Only allows alphanumeric characters, hyphens, and underscores.
pub fn validate_name(name: &str, field_name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("{} cannot be empty", field_name);
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        anyhow::bail!(
            "{} contains invalid characters: '{}'. Only alphanumeric, hyphens, and underscores are allowed",
            field_name,
            name
        );
    }

    Ok(())
}
