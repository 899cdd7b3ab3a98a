//! # Siding Core
//!
//! The host-independent half of the siding add-on framework.
//!
//! - **Data model**: [`AddonDescriptor`], [`AddonKey`], [`Requirement`]
//! - **Registry**: [`AddonRegistry`] stores descriptors per kind together with
//!   lifecycle state, the reverse dependency index and the blacklist
//! - **Discovery**: INI metadata ([`parse_metadata`]) found in directories or
//!   embedded resource namespaces ([`ResourceSource`])
//! - **Dependency resolution**: [`check_dependencies`], [`check_cycles`],
//!   [`load_order`]
//! - **Inheritance**: [`validate_inheritance`] and the generic fallback walk
//!   [`resolve`]
//!
//! Activation itself (cascading, wiring, hooks) lives in `siding-framework`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use siding_core::{AddonDescriptor, AddonRegistry, DependencyPolicy, check_dependencies};
//!
//! let mut registry = AddonRegistry::new();
//! registry.register(AddonDescriptor::new("plugin", "timers").with_version("1.0.0"))?;
//! registry.register(AddonDescriptor::new("plugin", "clock").requires("timers", "^1"))?;
//!
//! let clock = registry.get("plugin", "clock")?;
//! check_dependencies(&registry, clock, DependencyPolicy::default())?;
//! ```

pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod inheritance;
pub mod metadata;
pub mod registry;
pub mod source;

pub use dependency::{
    DependencyPolicy, check_cycles, check_dependencies, hard_dependencies, load_order,
};
pub use descriptor::{ANY_VERSION, APP_REQUIREMENT, AddonDescriptor, AddonKey, Requirement};
pub use error::{AddonError, AddonResult, BoxError, DependencyIssue};
pub use inheritance::{
    InheritanceIssue, InheritanceIssueKind, lineage, resolve, validate_all, validate_inheritance,
};
pub use metadata::{parse_metadata, split_list};
pub use registry::{AddonRegistry, AddonState, AddonType};
pub use source::{AddonPath, EmbeddedResources, ResourceSource};
