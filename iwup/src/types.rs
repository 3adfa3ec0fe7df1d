// Shared types between the bus facade, classifier and reactor

//! Shared data structures
//!
//! This module defines the configuration structures loaded from TOML, the
//! resolved runtime settings, and the typed property-change record that the
//! bus facade builds for every `PropertiesChanged` signal it delivers.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use zbus::zvariant::Value;

/// Interface monitored when neither the CLI nor the config file names one
pub const DEFAULT_INTERFACE: &str = "wlan0";

/// Module reloaded when neither the CLI nor the config file names one
pub const DEFAULT_MODULE: &str = "ath6kl_sdio";

/// What to do with an in-flight reload when SIGINT/SIGTERM arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InterruptPolicy {
    /// Let the reload run to completion (bounded by the command timeout)
    #[default]
    Finish,
    /// Abandon the reload and kill the running child process
    Kill,
}

impl fmt::Display for InterruptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finish => write!(f, "finish"),
            Self::Kill => write!(f, "kill"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// `[general]` table
    #[serde(default)]
    pub general: GeneralConfig,
}

/// General configuration options
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeneralConfig {
    /// Network interface to monitor
    #[serde(default)]
    pub interface: Option<String>,
    /// Kernel module to reload
    #[serde(default)]
    pub module: Option<String>,
    /// Per-command timeout in seconds
    #[serde(default)]
    pub command_timeout: Option<u64>,
    /// Handling of a reload in progress at shutdown
    #[serde(default)]
    pub on_interrupt: Option<InterruptPolicy>,
    /// env_logger filter used when RUST_LOG is unset
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Settings after merging CLI flags, config file and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Network interface to monitor
    pub interface: String,
    /// Kernel module to reload
    pub module: String,
    /// Limit for each external command
    pub command_timeout: Duration,
    /// Handling of a reload in progress at shutdown
    pub on_interrupt: InterruptPolicy,
    /// Default log filter
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            module: DEFAULT_MODULE.to_string(),
            command_timeout: Duration::from_secs(default_command_timeout()),
            on_interrupt: InterruptPolicy::Finish,
            log_level: default_log_level(),
        }
    }
}

// Default values for configuration
pub(crate) fn default_command_timeout() -> u64 {
    30
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

/// Value of a changed property, reduced to what the classifier inspects
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Any integer type that fits in an `i64`
    Int(i64),
    /// String or object path
    Str(String),
    /// Boolean
    Bool(bool),
    /// Anything else (arrays, dicts, out-of-range `u64`)
    Other,
}

impl PropertyValue {
    /// Integer view of the value, if it is numeric
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String view of the value, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Value<'_>> for PropertyValue {
    fn from(value: &Value<'_>) -> Self {
        match value {
            Value::U8(v) => Self::Int(i64::from(*v)),
            Value::I16(v) => Self::Int(i64::from(*v)),
            Value::U16(v) => Self::Int(i64::from(*v)),
            Value::I32(v) => Self::Int(i64::from(*v)),
            Value::U32(v) => Self::Int(i64::from(*v)),
            Value::I64(v) => Self::Int(*v),
            // u64 above i64::MAX is not a meaningful reason or level
            Value::U64(v) => i64::try_from(*v).map(Self::Int).unwrap_or(Self::Other),
            Value::Bool(b) => Self::Bool(*b),
            Value::Str(s) => Self::Str(s.to_string()),
            Value::ObjectPath(p) => Self::Str(p.to_string()),
            Value::Value(inner) => Self::from(inner.as_ref()),
            _ => Self::Other,
        }
    }
}

/// A `PropertiesChanged` signal, decoded
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyChange {
    /// Unique bus name of the emitter
    pub sender: Option<String>,
    /// Object path the signal was emitted on
    pub path: String,
    /// Interface whose properties changed
    pub interface_name: String,
    /// Changed properties with their new values
    pub changed: HashMap<String, PropertyValue>,
    /// Properties that changed without a value being sent
    pub invalidated: Vec<String>,
}

impl PropertyChange {
    /// Build a change record for `path` with the given changed properties
    pub fn new(
        path: impl Into<String>,
        interface_name: impl Into<String>,
        changed: impl IntoIterator<Item = (String, PropertyValue)>,
    ) -> Self {
        Self {
            sender: None,
            path: path.into(),
            interface_name: interface_name.into(),
            changed: changed.into_iter().collect(),
            invalidated: Vec::new(),
        }
    }
}
