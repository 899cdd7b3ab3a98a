//! Error types for the add-on system.
//!
//! Every fallible registry, resolver and state-machine operation returns an
//! [`AddonError`]. Inheritance problems are not errors: they are recovered
//! locally and reported as [`InheritanceIssue`](crate::inheritance::InheritanceIssue)
//! values instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::AddonKey;

/// Boxed error returned by add-on factories, hooks and signal handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a dependency could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyIssue {
    /// No add-on with that name is registered.
    Missing,
    /// The dependency is blacklisted and blacklists are not being ignored.
    Blacklisted,
    /// The dependency exists but its version does not satisfy the requirement.
    VersionMismatch {
        /// Requirement declared by the dependent.
        required: String,
        /// Version the dependency actually declares.
        found: String,
    },
    /// Following hard dependencies from the add-on leads back to `via`.
    Cycle {
        /// The add-on whose requirement closes the cycle.
        via: AddonKey,
    },
}

impl std::fmt::Display for DependencyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "not found"),
            Self::Blacklisted => write!(f, "blacklisted"),
            Self::VersionMismatch { required, found } => {
                write!(f, "version {found} does not satisfy {required}")
            }
            Self::Cycle { via } => write!(f, "dependency cycle through {via}"),
        }
    }
}

/// Errors that can occur while registering, resolving or activating add-ons.
#[derive(Error, Debug)]
pub enum AddonError {
    /// The referenced add-on is absent from the registry.
    #[error("{addon_type} add-on '{name}' not found")]
    NotFound {
        /// Add-on kind that was searched.
        addon_type: String,
        /// Requested name.
        name: String,
    },

    /// An add-on with the same name is already registered under the type.
    #[error("{addon_type} add-on '{name}' is already registered")]
    DuplicateName {
        /// Add-on kind.
        addon_type: String,
        /// Duplicate name.
        name: String,
    },

    /// The add-on kind was never declared.
    #[error("unknown add-on type '{0}'")]
    UnknownType(String),

    /// A hard dependency is missing, blacklisted, mismatched or cyclic.
    #[error("{addon} cannot be activated: dependency '{dependency}' is {issue}")]
    Dependency {
        /// The add-on whose requirement failed.
        addon: AddonKey,
        /// Name of the offending dependency, as written in `requires`.
        dependency: String,
        /// What is wrong with it.
        issue: DependencyIssue,
    },

    /// The add-on implementation could not be loaded or failed a lifecycle hook.
    #[error("failed to load {addon}: {reason}")]
    Load {
        /// The add-on that failed.
        addon: AddonKey,
        /// Human readable reason.
        reason: String,
    },

    /// A metadata file could not be parsed into a descriptor.
    #[error("invalid add-on metadata in {path}: {reason}")]
    Metadata {
        /// File that was being parsed.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Reading an add-on resource failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AddonError {
    /// Creates a not-found error.
    pub fn not_found(addon_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            addon_type: addon_type.into(),
            name: name.into(),
        }
    }

    /// Creates a dependency error.
    pub fn dependency(
        addon: AddonKey,
        dependency: impl Into<String>,
        issue: DependencyIssue,
    ) -> Self {
        Self::Dependency {
            addon,
            dependency: dependency.into(),
            issue,
        }
    }

    /// Creates a load error.
    pub fn load(addon: AddonKey, reason: impl Into<String>) -> Self {
        Self::Load {
            addon,
            reason: reason.into(),
        }
    }

    /// Creates a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for add-on operations.
pub type AddonResult<T> = Result<T, AddonError>;
