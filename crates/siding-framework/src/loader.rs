//! Add-on implementation loading.
//!
//! Implementations are registered as factories keyed by `(kind, module)`,
//! either at link time through `#[register_addon(kind)]` or programmatically
//! through [`AddonLoader::register`]. Loading a descriptor looks its `module`
//! up and calls the factory.

use std::collections::HashMap;
use std::sync::Arc;

use linkme::distributed_slice;
use tracing::{debug, warn};

use siding_core::{AddonDescriptor, AddonError, AddonResult, BoxError};

use crate::addon::Addon;

/// Factory signature used by `#[register_addon]`.
pub type AddonFactory = fn(&AddonDescriptor) -> Result<Box<dyn Addon>, BoxError>;

type DynFactory = Arc<dyn Fn(&AddonDescriptor) -> Result<Box<dyn Addon>, BoxError> + Send + Sync>;

/// One entry of the link-time factory table.
pub struct AddonFactoryEntry {
    /// Add-on kind, e.g. `"plugin"`.
    pub addon_type: &'static str,
    /// Module name the descriptor must declare.
    pub module: &'static str,
    pub factory: AddonFactory,
}

/// Link-time table of add-on factories.
/// Each `#[register_addon]` contributes one entry.
#[distributed_slice]
pub static ADDON_FACTORIES: [AddonFactoryEntry];

/// Maps `(kind, module)` to a factory.
#[derive(Default)]
pub struct AddonLoader {
    factories: HashMap<(String, String), DynFactory>,
}

impl AddonLoader {
    /// Creates a loader with no factories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a loader from every factory registered via
    /// `#[register_addon(...)]`.
    ///
    /// If several factories claim the same module a warning is emitted and
    /// the first one wins.
    pub fn collect_all() -> Self {
        let mut loader = Self::new();
        for entry in ADDON_FACTORIES.iter() {
            let key = (entry.addon_type.to_string(), entry.module.to_string());
            if loader.factories.contains_key(&key) {
                warn!(
                    addon_type = entry.addon_type,
                    module = entry.module,
                    "Multiple factories registered for module, using first"
                );
                continue;
            }
            let factory = entry.factory;
            loader.factories.insert(key, Arc::new(factory));
        }
        debug!(count = loader.factories.len(), "Collected add-on factories");
        loader
    }

    /// Registers (or replaces) the factory for `module` of `addon_type`.
    pub fn register<F>(&mut self, addon_type: &str, module: &str, factory: F)
    where
        F: Fn(&AddonDescriptor) -> Result<Box<dyn Addon>, BoxError> + Send + Sync + 'static,
    {
        let key = (addon_type.to_string(), module.to_string());
        if self.factories.insert(key, Arc::new(factory)).is_some() {
            debug!(addon_type, module, "Replaced add-on factory");
        }
    }

    /// Returns `true` if a factory exists for the descriptor's module.
    pub fn can_load(&self, descriptor: &AddonDescriptor) -> bool {
        self.factory_for(descriptor).is_some()
    }

    fn factory_for(&self, descriptor: &AddonDescriptor) -> Option<DynFactory> {
        self.factories
            .get(&(descriptor.addon_type().to_string(), descriptor.module().to_string()))
            .cloned()
    }

    /// Returns the factory that would load `descriptor`.
    ///
    /// The manager clones the factory out so no lock is held while it runs.
    pub(crate) fn resolve(&self, descriptor: &AddonDescriptor) -> AddonResult<DynFactory> {
        self.factory_for(descriptor).ok_or_else(|| {
            AddonError::load(
                descriptor.key().clone(),
                format!("no factory registered for module '{}'", descriptor.module()),
            )
        })
    }

    /// Instantiates `descriptor`.
    pub fn load(&self, descriptor: &AddonDescriptor) -> AddonResult<Box<dyn Addon>> {
        let factory = self.resolve(descriptor)?;
        instantiate(&factory, descriptor)
    }
}

pub(crate) fn instantiate(
    factory: &DynFactory,
    descriptor: &AddonDescriptor,
) -> AddonResult<Box<dyn Addon>> {
    factory(descriptor).map_err(|e| AddonError::load(descriptor.key().clone(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;
    impl Addon for Marker {}

    #[test]
    fn test_load_uses_module_name() {
        let mut loader = AddonLoader::new();
        loader.register("plugin", "clock_impl", |_| Ok(Box::new(Marker) as Box<dyn Addon>));

        let desc = AddonDescriptor::new("plugin", "clock").with_module("clock_impl");
        assert!(loader.can_load(&desc));
        assert!(loader.load(&desc).is_ok());

        let other = AddonDescriptor::new("style", "clock_impl");
        assert!(!loader.can_load(&other));
    }

    #[test]
    fn test_missing_and_failing_factories() {
        let mut loader = AddonLoader::new();
        loader.register("plugin", "broken", |_| Err("boom".into()));

        let err = loader
            .load(&AddonDescriptor::new("plugin", "absent"))
            .err()
            .unwrap();
        assert!(matches!(err, AddonError::Load { .. }));

        let err = loader
            .load(&AddonDescriptor::new("plugin", "broken"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("boom"));
    }
}
