//! Name-keyed signal/slot bus.
//!
//! Two kinds of application channels exist:
//!
//! - **Application signals** (`add_signal`): emitted by the application and
//!   delivered to every active add-on exposing a slot of the same name.
//! - **Application slots** (`add_slot`): handlers owned by the application
//!   and invoked when an active add-on emits a signal of the same name.
//!
//! The bus only stores connections. Wiring an add-on on activation and
//! unwiring it on deactivation are exact inverses: [`SignalBus::connect`]
//! records exactly the edges [`SignalBus::disconnect`] removes.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use siding_core::{AddonKey, BoxError};

use crate::addon::{Capabilities, SlotFn};
use crate::manager::AddonManager;

/// An application-owned slot. Receives the emitting add-on's key.
pub type AppSlotFn =
    Arc<dyn Fn(&AddonManager, &AddonKey, &[Value]) -> Result<(), BoxError> + Send + Sync>;

/// Outcome of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned an error (each logged once).
    pub failed: usize,
}

impl Delivery {
    /// Returns `true` if no handler failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

struct AppSlot {
    handler: AppSlotFn,
    emitters: IndexSet<AddonKey>,
}

#[derive(Default)]
pub(crate) struct SignalBus {
    /// Application signal → connected add-on slots.
    signals: IndexMap<String, IndexMap<AddonKey, SlotFn>>,
    /// Application slot → handler and connected add-on emitters.
    slots: IndexMap<String, AppSlot>,
}

impl SignalBus {
    /// Registers an application signal and connects it to every given active
    /// add-on exposing a same-named slot. Returns `false` if it existed.
    pub(crate) fn add_signal<'a>(
        &mut self,
        name: &str,
        active: impl IntoIterator<Item = (&'a AddonKey, &'a Capabilities)>,
    ) -> bool {
        if self.signals.contains_key(name) {
            return false;
        }
        let connected = active
            .into_iter()
            .filter_map(|(key, caps)| caps.get_slot(name).map(|s| (key.clone(), Arc::clone(s))))
            .collect();
        self.signals.insert(name.to_string(), connected);
        true
    }

    /// Registers (or replaces) an application slot and connects it to every
    /// given active add-on declaring a same-named signal.
    pub(crate) fn add_slot<'a>(
        &mut self,
        name: &str,
        handler: AppSlotFn,
        active: impl IntoIterator<Item = (&'a AddonKey, &'a Capabilities)>,
    ) {
        let emitters = active
            .into_iter()
            .filter(|(_, caps)| caps.has_signal(name))
            .map(|(key, _)| key.clone())
            .collect();
        self.slots
            .insert(name.to_string(), AppSlot { handler, emitters });
    }

    pub(crate) fn has_signal(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    pub(crate) fn has_slot(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Wires an add-on into every matching channel. Returns the number of
    /// connections made.
    pub(crate) fn connect(&mut self, key: &AddonKey, caps: &Capabilities) -> usize {
        let mut made = 0;
        for (name, connected) in self.signals.iter_mut() {
            if let Some(slot) = caps.get_slot(name) {
                connected.insert(key.clone(), Arc::clone(slot));
                made += 1;
            }
        }
        for (name, slot) in self.slots.iter_mut() {
            if caps.has_signal(name) {
                slot.emitters.insert(key.clone());
                made += 1;
            }
        }
        made
    }

    /// Removes every connection of an add-on. Returns the number removed.
    pub(crate) fn disconnect(&mut self, key: &AddonKey) -> usize {
        let mut removed = 0;
        for connected in self.signals.values_mut() {
            if connected.shift_remove(key).is_some() {
                removed += 1;
            }
        }
        for slot in self.slots.values_mut() {
            if slot.emitters.shift_remove(key) {
                removed += 1;
            }
        }
        removed
    }

    /// Snapshot of the add-on handlers connected to an application signal.
    pub(crate) fn signal_handlers(&self, name: &str) -> Vec<(AddonKey, SlotFn)> {
        self.signals
            .get(name)
            .map(|c| c.iter().map(|(k, s)| (k.clone(), Arc::clone(s))).collect())
            .unwrap_or_default()
    }

    /// The application slot `name`, if `key` is connected to it.
    pub(crate) fn slot_for(&self, key: &AddonKey, name: &str) -> Option<AppSlotFn> {
        self.slots
            .get(name)
            .filter(|slot| slot.emitters.contains(key))
            .map(|slot| Arc::clone(&slot.handler))
    }

    /// Channel names an add-on is currently wired into.
    pub(crate) fn connections_of(&self, key: &AddonKey) -> Vec<String> {
        let signals = self
            .signals
            .iter()
            .filter(|(_, c)| c.contains_key(key))
            .map(|(n, _)| n.clone());
        let slots = self
            .slots
            .iter()
            .filter(|(_, s)| s.emitters.contains(key))
            .map(|(n, _)| n.clone());
        signals.chain(slots).collect()
    }
}
