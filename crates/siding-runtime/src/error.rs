//! Runtime error types.

use siding_core::AddonError;
use siding_framework::StyleError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::profile::ProfileError;

/// Errors that can occur while initializing or driving a runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Addon(#[from] AddonError),

    #[error(transparent)]
    Style(#[from] StyleError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
