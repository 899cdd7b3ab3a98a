//! Add-on activation state machine and signal dispatch.
//!
//! [`AddonManager`] owns the [`AddonRegistry`], the [`AddonLoader`], every
//! loaded add-on instance and the signal bus. It:
//!
//! - Loads implementations on demand and records the `loaded` flag.
//! - Activates add-ons with **cascading activation**: every transitive hard
//!   dependency is validated first, then activated in post-order before the
//!   requested add-on. Nothing is mutated until the whole plan is known to be
//!   satisfiable.
//! - Deactivates add-ons **dependents first**, unconditionally: hook failures
//!   are logged and teardown continues. Dependencies that were only activated
//!   to satisfy the add-on are released afterwards.
//! - Maintains the reverse dependency index (`needed_by`) incrementally.
//! - Wires and unwires add-on capabilities into the signal bus and dispatches
//!   [`run_signal`](AddonManager::run_signal) broadcasts.
//!
//! # Locking
//!
//! Internal locks are held only for short bookkeeping sections and never
//! while add-on code (factories, hooks, handlers, observers) runs, so add-on
//! code may call back into the manager. State-changing operations are
//! serialized by a re-entrant lock: a hook that activates another add-on on
//! the same thread proceeds, another thread waits.
//!
//! # Example
//!
//! ```rust,ignore
//! use siding_framework::{AddonManager, plugin};
//!
//! let manager = AddonManager::new();
//! manager.add_type(plugin::plugin_type(["./plugins"]));
//! manager.discover(plugin::PLUGIN_TYPE)?;
//! manager.activate(plugin::PLUGIN_TYPE, "clock")?;
//! manager.run_signal("on_tick", &[]);
//! manager.deactivate(plugin::PLUGIN_TYPE, "clock")?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use siding_core::{
    AddonDescriptor, AddonError, AddonKey, AddonRegistry, AddonResult, AddonState, AddonType,
    BoxError, DependencyPolicy, InheritanceIssue, check_cycles, check_dependencies,
    hard_dependencies, inheritance, load_order,
};

use crate::addon::{Addon, Capabilities, LoadedAddon};
use crate::loader::{self, AddonLoader};
use crate::plugin::{
    NoUpdater, PLUGIN_TYPE, PluginInfo, PluginUpdater, UpdateEvent, UpdateObserver, UpdateReporter,
};
use crate::signal::{AppSlotFn, Delivery, SignalBus};

/// Callback invoked after an add-on changes between `Active` and `Inactive`.
pub type StateObserver = Arc<dyn Fn(&AddonKey, AddonState) + Send + Sync>;

/// Callback invoked when an inheritance chain is truncated.
pub type IssueObserver = Arc<dyn Fn(&InheritanceIssue) + Send + Sync>;

/// A difference between the maintained `needed_by` index and the one
/// recomputed from the active set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeededByMismatch {
    pub addon: AddonKey,
    /// What the active set implies.
    pub expected: Vec<AddonKey>,
    /// What the registry holds.
    pub actual: Vec<AddonKey>,
}

/// Central owner of add-on state, instances and the signal bus.
pub struct AddonManager {
    registry: RwLock<AddonRegistry>,
    loader: RwLock<AddonLoader>,
    instances: RwLock<HashMap<AddonKey, Arc<LoadedAddon>>>,
    bus: RwLock<SignalBus>,
    policy: RwLock<DependencyPolicy>,
    state_observers: RwLock<Vec<StateObserver>>,
    issue_observers: RwLock<Vec<IssueObserver>>,
    updater: RwLock<Arc<dyn PluginUpdater>>,
    /// Shared with every [`UpdateReporter`] handed out.
    update_observers: Arc<RwLock<Vec<UpdateObserver>>>,
    /// Serializes activation and deactivation; re-entrant for hooks.
    transition: ReentrantMutex<()>,
}

impl Default for AddonManager {
    fn default() -> Self {
        Self::with_loader(AddonLoader::collect_all())
    }
}

impl AddonManager {
    /// Creates a manager whose loader holds every `#[register_addon]` factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with an explicit loader.
    pub fn with_loader(loader: AddonLoader) -> Self {
        Self {
            registry: RwLock::new(AddonRegistry::new()),
            loader: RwLock::new(loader),
            instances: RwLock::new(HashMap::new()),
            bus: RwLock::new(SignalBus::default()),
            policy: RwLock::new(DependencyPolicy::default()),
            state_observers: RwLock::new(Vec::new()),
            issue_observers: RwLock::new(Vec::new()),
            updater: RwLock::new(Arc::new(NoUpdater)),
            update_observers: Arc::new(RwLock::new(Vec::new())),
            transition: ReentrantMutex::new(()),
        }
    }

    // ─── Registry access ─────────────────────────────────────────────────────

    /// Read access to the registry. Do not hold the guard across calls into
    /// the manager.
    pub fn registry(&self) -> RwLockReadGuard<'_, AddonRegistry> {
        self.registry.read()
    }

    /// Write access to the registry, for registration and configuration.
    /// Lifecycle bookkeeping should go through the manager instead.
    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, AddonRegistry> {
        self.registry.write()
    }

    /// Declares an add-on kind.
    pub fn add_type(&self, spec: AddonType) {
        self.registry.write().add_type(spec);
    }

    /// Registers a descriptor.
    pub fn register(&self, descriptor: AddonDescriptor) -> AddonResult<AddonKey> {
        self.registry.write().register(descriptor)
    }

    /// Discovers add-ons of a kind and validates their inheritance chains.
    pub fn discover(&self, addon_type: &str) -> AddonResult<usize> {
        let found = self.registry.write().discover(addon_type)?;
        self.validate_all_inheritance(addon_type);
        Ok(found)
    }

    /// Shared handle to a descriptor.
    pub fn descriptor(&self, addon_type: &str, name: &str) -> AddonResult<Arc<AddonDescriptor>> {
        self.registry
            .read()
            .get_shared(&AddonKey::new(addon_type, name))
    }

    /// Registers a factory on the manager's loader.
    pub fn register_factory<F>(&self, addon_type: &str, module: &str, factory: F)
    where
        F: Fn(&AddonDescriptor) -> Result<Box<dyn Addon>, BoxError> + Send + Sync + 'static,
    {
        self.loader.write().register(addon_type, module, factory);
    }

    /// Sets the dependency policy used by activation.
    pub fn set_policy(&self, policy: DependencyPolicy) {
        *self.policy.write() = policy;
    }

    pub fn policy(&self) -> DependencyPolicy {
        *self.policy.read()
    }

    pub fn set_blacklisted(&self, addon_type: &str, name: &str, blacklisted: bool) {
        self.registry
            .write()
            .set_blacklisted(addon_type, name, blacklisted);
    }

    pub fn set_app_version(&self, version: impl Into<String>) {
        self.registry.write().set_app_version(version);
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// Lifecycle state of an add-on.
    pub fn state(&self, addon_type: &str, name: &str) -> AddonResult<AddonState> {
        self.registry.read().state(&AddonKey::new(addon_type, name))
    }

    /// Returns `true` if the add-on is `Active`. Unknown add-ons are inactive.
    pub fn is_active(&self, addon_type: &str, name: &str) -> bool {
        self.registry
            .read()
            .is_active(&AddonKey::new(addon_type, name))
    }

    /// Returns `true` once the implementation has been instantiated.
    pub fn is_loaded(&self, addon_type: &str, name: &str) -> bool {
        self.registry
            .read()
            .is_loaded(&AddonKey::new(addon_type, name))
    }

    /// Returns `true` if the add-on was activated only as a dependency.
    pub fn is_implicit(&self, addon_type: &str, name: &str) -> bool {
        self.registry
            .read()
            .is_implicit(&AddonKey::new(addon_type, name))
    }

    /// Active add-ons currently depending on this one.
    pub fn needed_by(&self, addon_type: &str, name: &str) -> Vec<AddonKey> {
        self.registry
            .read()
            .needed_by(&AddonKey::new(addon_type, name))
    }

    /// Keys of every active add-on of a kind, in registration order.
    pub fn active(&self, addon_type: &str) -> Vec<AddonKey> {
        self.registry
            .read()
            .in_state(addon_type, AddonState::Active)
    }

    /// The loaded implementation of an add-on.
    pub fn addon(&self, addon_type: &str, name: &str) -> Option<Arc<dyn Addon>> {
        self.instance(&AddonKey::new(addon_type, name))
            .map(|i| Arc::clone(&i.addon))
    }

    /// Capabilities of a loaded add-on.
    pub fn capabilities(&self, addon_type: &str, name: &str) -> Option<Capabilities> {
        self.instance(&AddonKey::new(addon_type, name))
            .map(|i| i.capabilities.clone())
    }

    /// Bus channels an add-on is currently wired into.
    pub fn connections(&self, addon_type: &str, name: &str) -> Vec<String> {
        self.bus
            .read()
            .connections_of(&AddonKey::new(addon_type, name))
    }

    fn instance(&self, key: &AddonKey) -> Option<Arc<LoadedAddon>> {
        self.instances.read().get(key).cloned()
    }

    // ─── Observers ───────────────────────────────────────────────────────────

    /// Subscribes to `Active`/`Inactive` transitions.
    pub fn on_state_changed<F>(&self, observer: F)
    where
        F: Fn(&AddonKey, AddonState) + Send + Sync + 'static,
    {
        self.state_observers.write().push(Arc::new(observer));
    }

    /// Subscribes to inheritance truncations.
    pub fn on_inheritance_issue<F>(&self, observer: F)
    where
        F: Fn(&InheritanceIssue) + Send + Sync + 'static,
    {
        self.issue_observers.write().push(Arc::new(observer));
    }

    fn notify_state(&self, key: &AddonKey, state: AddonState) {
        let observers: Vec<StateObserver> = self.state_observers.read().clone();
        for observer in observers {
            observer(key, state);
        }
    }

    fn notify_issue(&self, issue: &InheritanceIssue) {
        let observers: Vec<IssueObserver> = self.issue_observers.read().clone();
        for observer in observers {
            observer(issue);
        }
    }

    // ─── Plugin updates ──────────────────────────────────────────────────────

    /// Installs the updater used by [`check_plugin_update`] and
    /// [`update_plugin`]. Replaces [`NoUpdater`].
    ///
    /// [`check_plugin_update`]: Self::check_plugin_update
    /// [`update_plugin`]: Self::update_plugin
    pub fn set_updater(&self, updater: impl PluginUpdater + 'static) {
        *self.updater.write() = Arc::new(updater);
    }

    /// Subscribes to update progress and outcomes.
    pub fn on_update_event<F>(&self, observer: F)
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.update_observers.write().push(Arc::new(observer));
    }

    /// Asks the updater whether a plugin has an update. The answer arrives
    /// as an [`UpdateEvent`]. Fails only if the plugin is not registered.
    pub fn check_plugin_update(&self, name: &str) -> AddonResult<()> {
        let (updater, info, reporter) = self.update_request(name)?;
        debug!(plugin = %name, "Checking for plugin update");
        updater.can_update(&info, &reporter);
        Ok(())
    }

    /// Asks the updater to install a plugin's update. The outcome arrives as
    /// an [`UpdateEvent`]. Fails only if the plugin is not registered.
    pub fn update_plugin(&self, name: &str) -> AddonResult<()> {
        let (updater, info, reporter) = self.update_request(name)?;
        info!(plugin = %name, "Updating plugin");
        updater.do_update(&info, &reporter);
        Ok(())
    }

    fn update_request(
        &self,
        name: &str,
    ) -> AddonResult<(Arc<dyn PluginUpdater>, PluginInfo, UpdateReporter)> {
        let descriptor = self.descriptor(PLUGIN_TYPE, name)?;
        let updater = Arc::clone(&*self.updater.read());
        let reporter = UpdateReporter::new(Arc::clone(&self.update_observers));
        Ok((updater, PluginInfo::from_descriptor(&descriptor), reporter))
    }

    // ─── Inheritance ─────────────────────────────────────────────────────────

    /// Validates one add-on's inheritance chain, truncating and reporting it
    /// if it is self-referencing or cyclic.
    pub fn validate_inheritance(
        &self,
        addon_type: &str,
        name: &str,
    ) -> AddonResult<Option<InheritanceIssue>> {
        let key = AddonKey::new(addon_type, name);
        let issue = inheritance::validate_inheritance(&mut self.registry.write(), &key)?;
        if let Some(issue) = &issue {
            self.notify_issue(issue);
        }
        Ok(issue)
    }

    /// Validates every add-on of a kind.
    pub fn validate_all_inheritance(&self, addon_type: &str) -> Vec<InheritanceIssue> {
        let issues = inheritance::validate_all(&mut self.registry.write(), addon_type);
        for issue in &issues {
            self.notify_issue(issue);
        }
        issues
    }

    // ─── Loading ─────────────────────────────────────────────────────────────

    /// Instantiates an add-on's implementation if it is not loaded yet.
    pub fn load(&self, addon_type: &str, name: &str) -> AddonResult<()> {
        let key = AddonKey::new(addon_type, name);
        let _guard = self.transition.lock();
        self.load_key(&key)
    }

    fn load_key(&self, key: &AddonKey) -> AddonResult<()> {
        let (descriptor, factory) = {
            let registry = self.registry.read();
            if registry.is_loaded(key) {
                return Ok(());
            }
            let policy = *self.policy.read();
            if registry.is_blacklisted(key) && !policy.ignore_blacklist {
                return Err(AddonError::load(key.clone(), "add-on is blacklisted"));
            }
            let descriptor = registry.get_shared(key)?;
            let factory = self.loader.read().resolve(&descriptor)?;
            (descriptor, factory)
        };

        let addon = loader::instantiate(&factory, &descriptor)?;
        let loaded = LoadedAddon::new(addon);
        debug!(
            addon = %key,
            slots = ?loaded.capabilities.slot_names().collect::<Vec<_>>(),
            signals = ?loaded.capabilities.signal_names().collect::<Vec<_>>(),
            "Add-on loaded"
        );

        self.instances.write().insert(key.clone(), Arc::new(loaded));
        self.registry.write().set_loaded(key, true)?;
        Ok(())
    }

    // ─── Activation ──────────────────────────────────────────────────────────

    /// Activates or deactivates an add-on.
    pub fn set_active(&self, addon_type: &str, name: &str, active: bool) -> AddonResult<()> {
        if active {
            self.activate(addon_type, name)
        } else {
            self.deactivate(addon_type, name)
        }
    }

    /// Activates an add-on and, first, every transitive hard dependency.
    ///
    /// Fails without changing any add-on's state if a dependency is missing,
    /// blacklisted, version-mismatched or cyclic, or if an implementation
    /// cannot be loaded. If an `on_activate` hook fails, or deactivates a
    /// dependency of the add-on it belongs to, everything this call activated
    /// is rolled back.
    ///
    /// Activating an add-on that is already active (or mid-activation) is a
    /// no-op apart from clearing its implicit flag.
    pub fn activate(&self, addon_type: &str, name: &str) -> AddonResult<()> {
        let key = AddonKey::new(addon_type, name);
        let _guard = self.transition.lock();

        let plan = {
            let mut registry = self.registry.write();
            match registry.state(&key)? {
                AddonState::Active => {
                    registry.set_implicit(&key, false)?;
                    return Ok(());
                }
                AddonState::Activating => return Ok(()),
                AddonState::Deactivating => {
                    return Err(AddonError::load(key, "add-on is being deactivated"));
                }
                AddonState::Inactive => {}
            }
            self.plan_activation(&registry, &key)?
        };
        debug!(addon = %key, plan = ?plan.iter().map(ToString::to_string).collect::<Vec<_>>(), "Activation planned");

        for member in &plan {
            self.load_key(member)?;
        }

        // Members a re-entrant hook engaged on its own are not ours to undo.
        let mut activated: Vec<&AddonKey> = Vec::with_capacity(plan.len());
        for member in &plan {
            let implicit = *member != key;
            match self.activate_one(member, implicit) {
                Ok(true) => activated.push(member),
                Ok(false) => {}
                Err(e) => {
                    error!(addon = %member, error = %e, "Activation failed; rolling back");
                    for done in activated.iter().rev() {
                        self.deactivate_key(done);
                    }
                    return Err(e);
                }
            }
        }

        info!(addon = %key, activated = activated.len(), "Add-on activated");
        Ok(())
    }

    /// Post-order list of `root` and every hard dependency that is not yet
    /// engaged, validated as a whole.
    fn plan_activation(
        &self,
        registry: &AddonRegistry,
        root: &AddonKey,
    ) -> AddonResult<Vec<AddonKey>> {
        let policy = *self.policy.read();
        if registry.is_blacklisted(root) && !policy.ignore_blacklist {
            return Err(AddonError::load(root.clone(), "add-on is blacklisted"));
        }
        check_cycles(registry, root)?;

        let mut order = Vec::new();
        let mut visited: HashSet<AddonKey> = HashSet::new();
        let mut stack: Vec<(AddonKey, bool)> = vec![(root.clone(), false)];

        while let Some((key, expanded)) = stack.pop() {
            if expanded {
                order.push(key);
                continue;
            }
            if !visited.insert(key.clone()) {
                continue;
            }
            if key != *root {
                match registry.state(&key)? {
                    AddonState::Active | AddonState::Activating => continue,
                    AddonState::Deactivating => {
                        return Err(AddonError::load(key, "dependency is being deactivated"));
                    }
                    AddonState::Inactive => {}
                }
            }

            let descriptor = registry.get_key(&key)?;
            check_dependencies(registry, descriptor, policy)?;

            let deps = hard_dependencies(descriptor);
            stack.push((key, true));
            for dep in deps.into_iter().rev() {
                if !visited.contains(&dep) {
                    stack.push((dep, false));
                }
            }
        }
        Ok(order)
    }

    /// Activates a single add-on whose dependencies are already engaged.
    /// Returns `false` if it was engaged already and nothing was done.
    fn activate_one(&self, key: &AddonKey, implicit: bool) -> AddonResult<bool> {
        {
            let mut registry = self.registry.write();
            if registry.state(key)?.is_engaged() {
                return Ok(false);
            }
            registry.set_state(key, AddonState::Activating)?;
            registry.set_implicit(key, implicit)?;
            let deps = hard_dependencies(registry.get_key(key)?);
            for dep in &deps {
                registry.add_dependent(dep, key);
            }
        }

        let instance = self.instance(key);
        if let Some(instance) = &instance {
            let wired = self.bus.write().connect(key, &instance.capabilities);
            debug!(addon = %key, connections = wired, "Handlers connected");
        }

        let hook = match &instance {
            Some(instance) => instance.addon.on_activate(self),
            None => Ok(()),
        };
        if let Err(e) = hook {
            self.abandon_activation(key, false);
            return Err(AddonError::load(
                key.clone(),
                format!("activation hook failed: {e}"),
            ));
        }

        // The hook may have torn down one of our dependencies.
        let lost = {
            let registry = self.registry.read();
            hard_dependencies(registry.get_key(key)?)
                .into_iter()
                .find(|dep| !matches!(registry.state(dep), Ok(s) if s.is_engaged()))
        };
        if let Some(dep) = lost {
            warn!(addon = %key, dependency = %dep, "Dependency deactivated during activation");
            self.abandon_activation(key, true);
            return Err(AddonError::load(
                key.clone(),
                format!("dependency {dep} was deactivated during activation"),
            ));
        }

        self.registry.write().set_state(key, AddonState::Active)?;
        if implicit {
            debug!(addon = %key, "Add-on activated as a dependency");
        }
        self.notify_state(key, AddonState::Active);
        Ok(true)
    }

    /// Returns an add-on stuck in `Activating` to `Inactive`, tearing down
    /// whatever its hook activated on top of it.
    fn abandon_activation(&self, key: &AddonKey, hook_ran: bool) {
        if let Err(e) = self.registry.write().set_state(key, AddonState::Deactivating) {
            warn!(addon = %key, error = %e, "Cannot mark add-on as deactivating");
        }
        let dependents = self.registry.read().needed_by(key);
        for dependent in &dependents {
            self.deactivate_key(dependent);
        }

        self.bus.write().disconnect(key);
        if hook_ran {
            if let Some(instance) = self.instance(key) {
                if let Err(e) = instance.addon.on_deactivate(self) {
                    error!(addon = %key, error = %e, "Deactivation hook failed; continuing");
                }
            }
        }

        self.release_edges(key);
        let mut registry = self.registry.write();
        let _ = registry.set_state(key, AddonState::Inactive);
        let _ = registry.set_implicit(key, false);
    }

    /// Removes `key` from its dependencies' `needed_by` and returns them.
    fn release_edges(&self, key: &AddonKey) -> Vec<AddonKey> {
        let mut registry = self.registry.write();
        let deps = registry
            .get_key(key)
            .map(hard_dependencies)
            .unwrap_or_default();
        for dep in &deps {
            registry.remove_dependent(dep, key);
        }
        deps
    }

    // ─── Deactivation ────────────────────────────────────────────────────────

    /// Deactivates an add-on, its active dependents first.
    ///
    /// Best-effort: hook failures are logged and teardown continues. Fails
    /// only if the add-on is not registered. Deactivating an inactive add-on
    /// is a no-op.
    pub fn deactivate(&self, addon_type: &str, name: &str) -> AddonResult<()> {
        let key = AddonKey::new(addon_type, name);
        let _guard = self.transition.lock();
        self.registry.read().state(&key)?;
        self.deactivate_key(&key);
        Ok(())
    }

    fn deactivate_key(&self, key: &AddonKey) {
        {
            let mut registry = self.registry.write();
            if !matches!(registry.state(key), Ok(AddonState::Active)) {
                return;
            }
            if let Err(e) = registry.set_state(key, AddonState::Deactivating) {
                warn!(addon = %key, error = %e, "Cannot mark add-on as deactivating");
                return;
            }
        }

        let dependents = self.registry.read().needed_by(key);
        for dependent in &dependents {
            if self.registry.read().is_active(dependent) {
                debug!(addon = %key, dependent = %dependent, "Deactivating dependent first");
                self.deactivate_key(dependent);
            }
        }

        let removed = self.bus.write().disconnect(key);
        debug!(addon = %key, connections = removed, "Handlers disconnected");

        if let Some(instance) = self.instance(key) {
            if let Err(e) = instance.addon.on_deactivate(self) {
                error!(addon = %key, error = %e, "Deactivation hook failed; continuing");
            }
        }

        let deps = self.release_edges(key);
        {
            let mut registry = self.registry.write();
            let _ = registry.set_state(key, AddonState::Inactive);
            let _ = registry.set_implicit(key, false);
        }
        info!(addon = %key, "Add-on deactivated");
        self.notify_state(key, AddonState::Inactive);

        for dep in deps {
            let release = {
                let registry = self.registry.read();
                registry.is_active(&dep)
                    && registry.is_implicit(&dep)
                    && registry.needed_by(&dep).is_empty()
            };
            if release {
                debug!(addon = %dep, "Releasing unneeded dependency");
                self.deactivate_key(&dep);
            }
        }
    }

    // ─── Bulk operations ─────────────────────────────────────────────────────

    /// Activates the named add-ons in dependency order, logging and skipping
    /// failures. Returns the failures.
    pub fn activate_all<I, S>(&self, addon_type: &str, names: I) -> Vec<(String, AddonError)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: HashSet<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        let order = load_order(&self.registry.read(), addon_type);

        let mut failures = Vec::new();
        for name in &wanted {
            if !self.registry.read().contains(addon_type, name) {
                warn!(addon_type = %addon_type, name = %name, "Requested add-on not found; skipped");
                failures.push((name.clone(), AddonError::not_found(addon_type, name)));
            }
        }
        for key in order.iter().filter(|k| wanted.contains(k.name())) {
            if let Err(e) = self.activate(addon_type, key.name()) {
                error!(addon = %key, error = %e, "Failed to activate add-on; skipped");
                failures.push((key.name().to_string(), e));
            }
        }
        failures
    }

    /// Deactivates every active add-on of a kind, dependents first.
    pub fn deactivate_all(&self, addon_type: &str) {
        let _guard = self.transition.lock();
        let order = load_order(&self.registry.read(), addon_type);
        for key in order.iter().rev() {
            self.deactivate_key(key);
        }
    }

    /// Recomputes `needed_by` from the active set and reports differences.
    /// Empty when the incremental index is consistent.
    pub fn verify_needed_by(&self) -> Vec<NeededByMismatch> {
        let registry = self.registry.read();
        let types: Vec<String> = registry.type_names().map(str::to_string).collect();

        let mut expected: HashMap<AddonKey, Vec<AddonKey>> = HashMap::new();
        for addon_type in &types {
            for key in registry.in_state(addon_type, AddonState::Active) {
                if let Ok(desc) = registry.get_key(&key) {
                    for dep in hard_dependencies(desc) {
                        expected.entry(dep).or_default().push(key.clone());
                    }
                }
            }
        }

        let mut mismatches = Vec::new();
        for addon_type in &types {
            for desc in registry.all(addon_type) {
                let key = desc.key();
                let mut want = expected.remove(key).unwrap_or_default();
                let mut have = registry.needed_by(key);
                want.sort();
                have.sort();
                if want != have {
                    mismatches.push(NeededByMismatch {
                        addon: key.clone(),
                        expected: want,
                        actual: have,
                    });
                }
            }
        }
        mismatches
    }

    // ─── Signals ─────────────────────────────────────────────────────────────

    fn active_capabilities(&self) -> Vec<(AddonKey, Arc<LoadedAddon>)> {
        let registry = self.registry.read();
        let instances = self.instances.read();
        registry
            .type_names()
            .flat_map(|t| registry.in_state(t, AddonState::Active))
            .filter_map(|key| instances.get(&key).cloned().map(|i| (key, i)))
            .collect()
    }

    /// Registers an application signal and connects it to every active
    /// add-on exposing a same-named slot.
    pub fn add_signal(&self, name: &str) {
        let active = self.active_capabilities();
        let added = self
            .bus
            .write()
            .add_signal(name, active.iter().map(|(k, i)| (k, &i.capabilities)));
        if !added {
            debug!(signal = %name, "Signal already registered");
        }
    }

    /// Registers an application slot and connects it to every active add-on
    /// declaring a same-named signal.
    pub fn add_slot<F>(&self, name: &str, handler: F)
    where
        F: Fn(&AddonManager, &AddonKey, &[Value]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let active = self.active_capabilities();
        let handler: AppSlotFn = Arc::new(handler);
        self.bus
            .write()
            .add_slot(name, handler, active.iter().map(|(k, i)| (k, &i.capabilities)));
    }

    /// Emits an application signal to the connected add-on slots.
    pub fn emit_signal(&self, name: &str, args: &[Value]) -> Delivery {
        let handlers = {
            let bus = self.bus.read();
            if !bus.has_signal(name) {
                warn!(signal = %name, "Emitting unregistered signal");
            }
            bus.signal_handlers(name)
        };
        let mut delivery = Delivery::default();
        for (key, handler) in handlers {
            self.deliver(&mut delivery, &key, name, handler(self, args));
        }
        delivery
    }

    /// Emits `name` on behalf of an add-on, invoking the application slot it
    /// is connected to, if any.
    pub fn emit_from(&self, key: &AddonKey, name: &str, args: &[Value]) -> Delivery {
        let slot = {
            let bus = self.bus.read();
            if !bus.has_slot(name) {
                debug!(addon = %key, signal = %name, "No application slot for signal");
            }
            bus.slot_for(key, name)
        };
        let mut delivery = Delivery::default();
        if let Some(slot) = slot {
            self.deliver(&mut delivery, key, name, slot(self, key, args));
        }
        delivery
    }

    /// Invokes the slot `name` on every active add-on that exposes it.
    ///
    /// A failing handler is logged once and counted; delivery continues.
    pub fn run_signal(&self, name: &str, args: &[Value]) -> Delivery {
        let targets: Vec<(AddonKey, Arc<LoadedAddon>)> = self
            .active_capabilities()
            .into_iter()
            .filter(|(_, i)| i.capabilities.get_slot(name).is_some())
            .collect();

        let mut delivery = Delivery::default();
        for (key, instance) in targets {
            if let Some(handler) = instance.capabilities.get_slot(name) {
                self.deliver(&mut delivery, &key, name, handler(self, args));
            }
        }
        delivery
    }

    fn deliver(
        &self,
        delivery: &mut Delivery,
        key: &AddonKey,
        signal: &str,
        result: Result<(), BoxError>,
    ) {
        match result {
            Ok(()) => delivery.delivered += 1,
            Err(e) => {
                error!(addon = %key, signal = %signal, error = %e, "Signal handler failed");
                delivery.failed += 1;
            }
        }
    }
}

impl std::fmt::Debug for AddonManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonManager")
            .field("instances", &self.instances.read().len())
            .field("policy", &*self.policy.read())
            .finish_non_exhaustive()
    }
}
