//! Configuration module for the Siding runtime.
//!
//! This module provides layered configuration loading (defaults, TOML file,
//! environment) and validation for application, add-on, style, profile and
//! logging settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    AddonsConfig, ApplicationConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    ProfileConfig, SidingConfig, SpanEventConfig, StyleConfig,
};
pub use validation::validate_config;
