//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SidingConfig {
    /// Host application identity and locations.
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Add-on discovery and activation.
    #[serde(default)]
    pub addons: AddonsConfig,

    /// Style selection.
    #[serde(default)]
    pub style: StyleConfig,

    /// Profile selection.
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Host application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationConfig {
    /// Application name, used for the user data directory.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Application version checked against `__app__` requirements.
    #[serde(default)]
    pub version: Option<String>,

    /// Application root directory. Defaults to the current directory.
    #[serde(default)]
    pub root_path: Option<PathBuf>,

    /// Extra resource directories, searched between the profile and the root.
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Directory for extracted and decoded style resources. Defaults to
    /// `<profile>/cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: None,
            root_path: None,
            sources: Vec::new(),
            cache_dir: None,
        }
    }
}

fn default_app_name() -> String {
    "siding".to_string()
}

/// Add-on settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AddonsConfig {
    /// Skip automatic activation of plugins and styles.
    #[serde(default)]
    pub safe_mode: bool,

    /// Extra plugin search paths, searched before the defaults.
    #[serde(default)]
    pub plugin_paths: Vec<PathBuf>,

    /// Extra style search paths, searched before the defaults.
    #[serde(default)]
    pub style_paths: Vec<PathBuf>,

    /// Plugin names that must not be activated.
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// Activate blacklisted add-ons anyway.
    #[serde(default)]
    pub ignore_blacklist: bool,
}

/// Style settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleConfig {
    /// Style used when neither the command line nor the profile names one.
    #[serde(default = "default_style")]
    pub default_style: String,

    /// Style to activate, overriding the profile.
    #[serde(default)]
    pub style: Option<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            default_style: default_style(),
            style: None,
        }
    }
}

fn default_style() -> String {
    "default".to_string()
}

/// Profile settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    /// Profile name.
    #[serde(default = "default_profile")]
    pub name: String,

    /// Keep profiles below the application root instead of the user data
    /// directory.
    #[serde(default)]
    pub portable: bool,

    /// Explicit profile directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: default_profile(),
            portable: false,
            path: None,
        }
    }
}

fn default_profile() -> String {
    "default".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Base log level.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Per-module levels, e.g. `siding_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// How often the log file is rotated.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Rotated log files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            filters: BTreeMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
        }
    }
}

fn default_max_files() -> u32 {
    5
}
