//! # Siding Framework
//!
//! Runtime behaviour on top of `siding-core`'s data model.
//!
//! This layer provides:
//! - The [`Addon`] trait and explicit [`Capabilities`] (slots and signals)
//! - [`AddonLoader`], mapping `(type, module)` pairs to factories, filled from
//!   `#[register_addon]` functions at link time
//! - [`AddonManager`], the activation state machine with cascading
//!   activation, dependents-first deactivation and the signal bus
//! - The two add-on kinds shipped with siding: [`plugin`] and [`style`]
//! - [`PluginUpdater`], the in-app plugin update hook
//!
//! ## Lifecycle
//!
//! ```text
//! discover ──► register ──► load (factory) ──► activate ──► deactivate
//!                               │                  │
//!                         capabilities      bus connect / on_activate
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use siding_framework::prelude::*;
//!
//! struct Clock;
//!
//! impl Addon for Clock {
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::new().slot("on_tick", |_, _| Ok(()))
//!     }
//! }
//!
//! #[register_addon(plugin)]
//! fn clock(_: &AddonDescriptor) -> Result<Box<dyn Addon>, BoxError> {
//!     Ok(Box::new(Clock))
//! }
//! ```

pub mod addon;
pub mod loader;
pub mod manager;
pub mod plugin;
pub mod signal;
pub mod style;

// Re-exported so code generated by `#[register_addon]` resolves `linkme`.
pub use linkme;

pub use addon::{Addon, Capabilities, SlotFn};
pub use loader::{ADDON_FACTORIES, AddonFactory, AddonFactoryEntry, AddonLoader};
pub use manager::{AddonManager, IssueObserver, NeededByMismatch, StateObserver};
pub use plugin::{
    NO_UPDATER_MESSAGE, NoUpdater, PLUGIN_METADATA, PLUGIN_TYPE, PluginInfo, PluginUpdater,
    UpdateEvent, UpdateObserver, UpdateReporter,
};
pub use signal::{AppSlotFn, Delivery};
pub use style::{
    Icon, STYLE_METADATA, STYLE_TYPE, StyleError, StyleHost, StyleInfo, StyleManager,
    StyledWidget,
};

pub use siding_core::{
    APP_REQUIREMENT, AddonDescriptor, AddonError, AddonKey, AddonPath, AddonRegistry,
    AddonResult, AddonState, AddonType, BoxError, DependencyIssue, DependencyPolicy,
    EmbeddedResources, InheritanceIssue, InheritanceIssueKind, ResourceSource,
};
pub use siding_macros::register_addon;

/// Common imports for add-on authors and host applications.
pub mod prelude {
    pub use crate::{
        Addon, AddonDescriptor, AddonError, AddonKey, AddonManager, AddonState, BoxError,
        Capabilities, Delivery, StyleHost, StyleManager, StyledWidget, register_addon,
    };
}
