use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use siding_framework::prelude::*;
use siding_framework::{AddonLoader, DependencyIssue, DependencyPolicy, PLUGIN_TYPE};

/// Records hook calls as `"<name>:<hook>"`.
type Journal = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: String,
    journal: Journal,
    fail_activate: bool,
}

impl Addon for Recorder {
    fn on_activate(&self, _: &AddonManager) -> Result<(), BoxError> {
        self.journal.lock().push(format!("{}:activate", self.name));
        if self.fail_activate {
            return Err("refusing to start".into());
        }
        Ok(())
    }

    fn on_deactivate(&self, _: &AddonManager) -> Result<(), BoxError> {
        self.journal.lock().push(format!("{}:deactivate", self.name));
        Ok(())
    }
}

/// Registers plugins `(name, requires)` with journaling factories.
fn manager(plugins: &[(&str, &[&str])], failing: &[&str]) -> (AddonManager, Journal) {
    let manager = AddonManager::with_loader(AddonLoader::new());
    let journal: Journal = Arc::default();

    for (name, requires) in plugins {
        let desc = requires
            .iter()
            .fold(AddonDescriptor::new(PLUGIN_TYPE, *name), |d, r| d.requires(*r, "*"));
        manager.register(desc).unwrap();

        let journal = journal.clone();
        let fail_activate = failing.contains(name);
        manager.register_factory(PLUGIN_TYPE, name, move |d| {
            Ok(Box::new(Recorder {
                name: d.name().to_string(),
                journal: journal.clone(),
                fail_activate,
            }) as Box<dyn Addon>)
        });
    }
    (manager, journal)
}

fn active_names(manager: &AddonManager) -> Vec<String> {
    manager
        .active(PLUGIN_TYPE)
        .into_iter()
        .map(|k| k.name().to_string())
        .collect()
}

#[test]
fn test_missing_dependency_changes_nothing() {
    let (manager, journal) = manager(&[("base", &[]), ("d", &["base", "ghost"])], &[]);

    let err = manager.activate(PLUGIN_TYPE, "d").unwrap_err();
    assert!(matches!(
        err,
        AddonError::Dependency { ref dependency, issue: DependencyIssue::Missing, .. } if dependency == "ghost"
    ));

    for name in ["base", "d"] {
        assert_eq!(manager.state(PLUGIN_TYPE, name).unwrap(), AddonState::Inactive);
        assert!(!manager.is_loaded(PLUGIN_TYPE, name));
        assert!(manager.needed_by(PLUGIN_TYPE, name).is_empty());
    }
    assert!(journal.lock().is_empty());
}

#[test]
fn test_activate_then_deactivate_restores_indexes() {
    let (manager, journal) = manager(
        &[("e", &[]), ("f", &["e"]), ("d", &["e", "f"]), ("other", &["e"])],
        &[],
    );
    manager.activate(PLUGIN_TYPE, "other").unwrap();
    let active_before = active_names(&manager);
    let needed_before = manager.needed_by(PLUGIN_TYPE, "e");

    manager.activate(PLUGIN_TYPE, "d").unwrap();
    assert_eq!(active_names(&manager), vec!["e", "f", "d", "other"]);
    assert!(manager.is_implicit(PLUGIN_TYPE, "f"));
    assert!(!manager.is_implicit(PLUGIN_TYPE, "d"));
    assert!(manager.verify_needed_by().is_empty());

    manager.deactivate(PLUGIN_TYPE, "d").unwrap();
    assert_eq!(active_names(&manager), active_before);
    assert_eq!(manager.needed_by(PLUGIN_TYPE, "e"), needed_before);
    assert!(manager.needed_by(PLUGIN_TYPE, "f").is_empty());
    assert!(manager.verify_needed_by().is_empty());

    // `f` was released because nothing needed it any more.
    assert!(journal.lock().contains(&"f:deactivate".to_string()));
}

#[test]
fn test_dependents_are_deactivated_first() {
    let (manager, journal) = manager(&[("x", &[]), ("y", &["x"])], &[]);
    manager.activate(PLUGIN_TYPE, "x").unwrap();
    manager.activate(PLUGIN_TYPE, "y").unwrap();
    journal.lock().clear();

    manager.deactivate(PLUGIN_TYPE, "x").unwrap();

    assert_eq!(*journal.lock(), vec!["y:deactivate", "x:deactivate"]);
    assert!(!manager.is_active(PLUGIN_TYPE, "x"));
    assert!(!manager.is_active(PLUGIN_TYPE, "y"));
}

#[test]
fn test_dependency_cascade_and_teardown() {
    let (manager, _) = manager(&[("a", &[]), ("b", &["a"])], &[]);

    manager.activate(PLUGIN_TYPE, "b").unwrap();
    assert!(manager.is_active(PLUGIN_TYPE, "a"));
    assert!(manager.is_active(PLUGIN_TYPE, "b"));
    assert_eq!(
        manager.needed_by(PLUGIN_TYPE, "a"),
        vec![AddonKey::new(PLUGIN_TYPE, "b")]
    );

    manager.deactivate(PLUGIN_TYPE, "a").unwrap();
    assert!(!manager.is_active(PLUGIN_TYPE, "a"));
    assert!(!manager.is_active(PLUGIN_TYPE, "b"));
    assert!(manager.needed_by(PLUGIN_TYPE, "a").is_empty());
}

#[test]
fn test_hook_failure_rolls_back() {
    let (manager, journal) = manager(&[("a", &[]), ("b", &["a"]), ("c", &["b"])], &["c"]);

    let err = manager.activate(PLUGIN_TYPE, "c").unwrap_err();
    assert!(matches!(err, AddonError::Load { .. }));

    assert!(active_names(&manager).is_empty());
    assert!(manager.verify_needed_by().is_empty());
    assert_eq!(
        *journal.lock(),
        vec!["a:activate", "b:activate", "c:activate", "b:deactivate", "a:deactivate"]
    );
}

#[test]
fn test_blacklisted_dependency() {
    let (manager, _) = manager(&[("a", &[]), ("b", &["a"])], &[]);
    manager.set_blacklisted(PLUGIN_TYPE, "a", true);

    let err = manager.activate(PLUGIN_TYPE, "b").unwrap_err();
    assert!(matches!(
        err,
        AddonError::Dependency { issue: DependencyIssue::Blacklisted, .. }
    ));

    manager.set_policy(DependencyPolicy::ignoring_blacklist());
    manager.activate(PLUGIN_TYPE, "b").unwrap();
    assert!(manager.is_active(PLUGIN_TYPE, "a"));
}

#[test]
fn test_activate_all_follows_dependency_order() {
    let (manager, journal) = manager(
        &[("top", &["mid"]), ("mid", &["low"]), ("low", &[]), ("broken", &["ghost"])],
        &[],
    );

    let failures = manager.activate_all(PLUGIN_TYPE, ["top", "low", "broken", "nope"]);
    let mut failed: Vec<&str> = failures.iter().map(|(n, _)| n.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["broken", "nope"]);

    assert_eq!(
        *journal.lock(),
        vec!["low:activate", "mid:activate", "top:activate"]
    );
    // `low` was asked for explicitly, `mid` only as a dependency.
    assert!(!manager.is_implicit(PLUGIN_TYPE, "low"));
    assert!(manager.is_implicit(PLUGIN_TYPE, "mid"));

    manager.deactivate_all(PLUGIN_TYPE);
    assert!(active_names(&manager).is_empty());
}

#[test]
fn test_hooks_may_reenter_the_manager() {
    struct Starter;

    impl Addon for Starter {
        fn on_activate(&self, manager: &AddonManager) -> Result<(), BoxError> {
            manager.activate(PLUGIN_TYPE, "helper")?;
            Ok(())
        }
    }

    let manager = AddonManager::with_loader(AddonLoader::new());
    manager.register(AddonDescriptor::new(PLUGIN_TYPE, "starter")).unwrap();
    manager.register(AddonDescriptor::new(PLUGIN_TYPE, "helper")).unwrap();
    manager.register_factory(PLUGIN_TYPE, "starter", |_| Ok(Box::new(Starter) as Box<dyn Addon>));
    manager.register_factory(PLUGIN_TYPE, "helper", |_| {
        Ok(Box::new(Recorder {
            name: "helper".to_string(),
            journal: Arc::default(),
            fail_activate: false,
        }) as Box<dyn Addon>)
    });

    manager.activate(PLUGIN_TYPE, "starter").unwrap();
    assert!(manager.is_active(PLUGIN_TYPE, "helper"));
}

#[test]
fn test_inheritance_cycle_is_broken() {
    let manager = AddonManager::with_loader(AddonLoader::new());
    manager
        .register(AddonDescriptor::new(PLUGIN_TYPE, "D").inherits("A"))
        .unwrap();
    manager
        .register(AddonDescriptor::new(PLUGIN_TYPE, "A").inherits("D"))
        .unwrap();
    let reported = Arc::new(Mutex::new(0));
    let counter = reported.clone();
    manager.on_inheritance_issue(move |_| *counter.lock() += 1);

    let issues = manager.validate_all_inheritance(PLUGIN_TYPE);
    assert!(!issues.is_empty());
    assert_eq!(*reported.lock(), issues.len());

    let cleared = ["D", "A"]
        .iter()
        .filter(|n| manager.descriptor(PLUGIN_TYPE, n).unwrap().inherits_from().is_empty())
        .count();
    assert!(cleared >= 1);
    assert!(manager.validate_all_inheritance(PLUGIN_TYPE).is_empty());
}

#[test]
fn test_state_observers_see_transitions() {
    let (manager, _) = manager(&[("a", &[]), ("b", &["a"])], &[]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager.on_state_changed(move |key, state| {
        if matches!(state, AddonState::Active | AddonState::Inactive) {
            sink.lock().push(format!("{}:{state:?}", key.name()));
        }
    });

    manager.activate(PLUGIN_TYPE, "b").unwrap();
    manager.deactivate(PLUGIN_TYPE, "b").unwrap();

    assert_eq!(
        *seen.lock(),
        vec!["a:Active", "b:Active", "b:Inactive", "a:Inactive"]
    );
}

/// Runs `action` against the manager from its `on_activate` hook.
struct Meddler {
    action: fn(&AddonManager) -> Result<(), BoxError>,
}

impl Addon for Meddler {
    fn on_activate(&self, manager: &AddonManager) -> Result<(), BoxError> {
        (self.action)(manager)
    }
}

fn register_meddler(
    manager: &AddonManager,
    name: &str,
    action: fn(&AddonManager) -> Result<(), BoxError>,
) {
    manager.register_factory(PLUGIN_TYPE, name, move |_| {
        Ok(Box::new(Meddler { action }) as Box<dyn Addon>)
    });
}

#[test]
fn test_hook_deactivating_its_dependency_fails_activation() {
    let (manager, journal) = manager(&[("a", &[])], &[]);
    manager
        .register(AddonDescriptor::new(PLUGIN_TYPE, "b").requires("a", "*"))
        .unwrap();
    register_meddler(&manager, "b", |m| Ok(m.deactivate(PLUGIN_TYPE, "a")?));

    let err = manager.activate(PLUGIN_TYPE, "b").unwrap_err();
    assert!(matches!(err, AddonError::Load { .. }));

    assert_eq!(manager.state(PLUGIN_TYPE, "a").unwrap(), AddonState::Inactive);
    assert_eq!(manager.state(PLUGIN_TYPE, "b").unwrap(), AddonState::Inactive);
    assert!(manager.needed_by(PLUGIN_TYPE, "a").is_empty());
    assert!(manager.connections(PLUGIN_TYPE, "b").is_empty());
    assert!(manager.verify_needed_by().is_empty());
    assert_eq!(*journal.lock(), vec!["a:activate", "a:deactivate"]);

    // An explicitly active dependency is left as the hook left it.
    manager.activate(PLUGIN_TYPE, "a").unwrap();
    assert!(manager.activate(PLUGIN_TYPE, "b").is_err());
    assert!(active_names(&manager).is_empty());
    assert!(manager.verify_needed_by().is_empty());
}

#[test]
fn test_rollback_spares_addons_activated_by_hooks() {
    let (manager, journal) = manager(&[("y", &[]), ("c", &["x", "y"])], &["c"]);
    manager.register(AddonDescriptor::new(PLUGIN_TYPE, "x")).unwrap();
    register_meddler(&manager, "x", |m| Ok(m.activate(PLUGIN_TYPE, "y")?));

    let err = manager.activate(PLUGIN_TYPE, "c").unwrap_err();
    assert!(matches!(err, AddonError::Load { .. }));

    // `y` was activated explicitly by `x`'s hook, not by this call.
    assert_eq!(active_names(&manager), vec!["y"]);
    assert!(!manager.is_implicit(PLUGIN_TYPE, "y"));
    assert!(!manager.is_active(PLUGIN_TYPE, "x"));
    assert!(manager.verify_needed_by().is_empty());
    assert_eq!(*journal.lock(), vec!["y:activate", "c:activate"]);
}
