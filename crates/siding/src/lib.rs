//! # Siding
//!
//! An add-on framework for desktop applications.
//!
//! ## Overview
//!
//! Siding discovers add-ons from metadata files, resolves their dependencies
//! and inheritance chains, and drives their activation. Two kinds ship with
//! the framework:
//!
//! - **Plugins** (`plugin.ini`): activating one activates its dependencies
//!   first; deactivating one tears its dependents down first.
//! - **Styles** (`style.ini`): data-only themes with inherited stylesheets,
//!   images and values, applied through a host-provided [`StyleHost`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ SidingRuntime│────▶│ AddonManager │────▶│ AddonRegistry │
//! │ config, CLI, │     │ activation,  │     │ descriptors,  │
//! │ profile      │     │ signals      │     │ needed_by     │
//! └──────────────┘     └──────────────┘     └───────────────┘
//!         │                    ▲
//!         ▼                    │
//! ┌──────────────┐             │
//! │ StyleManager │─────────────┘
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use siding::prelude::*;
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
//!
//! fn main() -> Result<(), RuntimeError> {
//!     let runtime = SidingRuntime::builder()
//!         .args(std::env::args().skip(1))
//!         .build(Arc::new(MyHost::default()))?;
//!     runtime.addons().run_signal("on_tick", &[]);
//!     runtime.shutdown()
//! }
//! ```
//!
//! `#[register_addon]` expands to paths under `siding_framework`, so crates
//! that register add-ons depend on `siding-framework` directly.
//!
//! ## Features
//!
//! - `toml-config`: read `siding.toml` (default)
//! - `json-log`: JSON log output

pub use siding_core as core;
pub use siding_framework as framework;
pub use siding_runtime as runtime;

pub use siding_framework::StyleHost;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use siding::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use siding_runtime::{InitArgs, RuntimeError, SidingRuntime};

    // Add-on implementations
    pub use siding_framework::prelude::*;

    // Plugins and styles
    pub use siding_framework::{
        Icon, PLUGIN_TYPE, PluginInfo, PluginUpdater, STYLE_TYPE, StyleInfo, UpdateEvent,
        UpdateReporter,
    };

    // Logging
    pub use siding_runtime::prelude::*;
}
