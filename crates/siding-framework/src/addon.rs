//! The [`Addon`] trait and the capabilities an add-on exposes to the bus.
//!
//! Add-ons declare their slot handlers and emitted signals explicitly when
//! they are loaded. The manager reads [`Addon::capabilities`] exactly once per
//! instance and wires those entries on every activation.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use siding_core::BoxError;

use crate::manager::AddonManager;

/// A named handler exposed by an add-on.
///
/// Handlers receive the manager so they can emit signals or inspect state.
/// The manager holds no locks while a handler runs.
pub type SlotFn = Arc<dyn Fn(&AddonManager, &[Value]) -> Result<(), BoxError> + Send + Sync>;

/// Slot handlers and signal names an add-on participates with.
#[derive(Clone, Default)]
pub struct Capabilities {
    slots: IndexMap<String, SlotFn>,
    signals: IndexSet<String>,
}

impl Capabilities {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exposes a slot handler under `name`.
    pub fn slot<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&AddonManager, &[Value]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.slots.insert(name.into(), Arc::new(handler));
        self
    }

    /// Declares that the add-on emits the signal `name`.
    pub fn signal(mut self, name: impl Into<String>) -> Self {
        self.signals.insert(name.into());
        self
    }

    /// Returns the slot handler registered under `name`.
    pub fn get_slot(&self, name: &str) -> Option<&SlotFn> {
        self.slots.get(name)
    }

    /// Returns `true` if the add-on declares the signal `name`.
    pub fn has_signal(&self, name: &str) -> bool {
        self.signals.contains(name)
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn signal_names(&self) -> impl Iterator<Item = &str> {
        self.signals.iter().map(String::as_str)
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("signals", &self.signals)
            .finish()
    }
}

/// A loaded add-on implementation.
///
/// All methods have no-op defaults, so a marker add-on is simply
/// `impl Addon for MyAddon {}`.
pub trait Addon: Send + Sync {
    /// Slot handlers and signals this add-on participates with.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Called after dependencies are active and handlers are wired.
    ///
    /// Returning an error aborts the activation and rolls it back.
    fn on_activate(&self, _manager: &AddonManager) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called after dependents are deactivated and handlers are unwired.
    ///
    /// Errors are logged; deactivation always completes.
    fn on_deactivate(&self, _manager: &AddonManager) -> Result<(), BoxError> {
        Ok(())
    }
}

/// An instantiated add-on together with its capabilities snapshot.
pub(crate) struct LoadedAddon {
    pub(crate) addon: Arc<dyn Addon>,
    pub(crate) capabilities: Capabilities,
}

impl LoadedAddon {
    pub(crate) fn new(addon: Box<dyn Addon>) -> Self {
        let addon: Arc<dyn Addon> = Arc::from(addon);
        let capabilities = addon.capabilities();
        Self {
            addon,
            capabilities,
        }
    }
}
