use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use siding_framework::prelude::*;
use siding_framework::{
    AddonLoader, NO_UPDATER_MESSAGE, PLUGIN_TYPE, PluginInfo, PluginUpdater, UpdateEvent,
    UpdateReporter,
};

fn manager() -> (AddonManager, Arc<Mutex<Vec<UpdateEvent>>>) {
    let manager = AddonManager::with_loader(AddonLoader::new());
    manager
        .register(AddonDescriptor::new(PLUGIN_TYPE, "clock").with_version("1.0.0"))
        .unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    manager.on_update_event(move |event| sink.lock().push(event.clone()));
    (manager, events)
}

/// Finds every plugin current, and installs updates in two steps.
struct StaticUpdater;

impl PluginUpdater for StaticUpdater {
    fn can_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter) {
        reporter.finished(plugin, false);
    }

    fn do_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter) {
        reporter.progress(plugin, 40, Some("downloading"));
        reporter.progress(plugin, 250, None);
        reporter.finished(plugin, true);
    }
}

#[test]
fn test_default_updater_reports_not_installed() {
    let (manager, events) = manager();

    manager.check_plugin_update("clock").unwrap();
    manager.update_plugin("clock").unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 2);
    for event in events.iter() {
        match event {
            UpdateEvent::Error { plugin, error } => {
                assert_eq!(plugin.name, "clock");
                assert_eq!(error, NO_UPDATER_MESSAGE);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[test]
fn test_installed_updater_reports_progress_and_outcome() {
    let (manager, events) = manager();
    manager.set_updater(StaticUpdater);

    manager.check_plugin_update("clock").unwrap();
    manager.update_plugin("clock").unwrap();

    let summary: Vec<String> = events
        .lock()
        .iter()
        .map(|event| match event {
            UpdateEvent::Progress { percent, message, .. } => {
                format!("progress {percent} {}", message.as_deref().unwrap_or("-"))
            }
            UpdateEvent::Finished { updated, .. } => format!("finished {updated}"),
            UpdateEvent::Error { error, .. } => format!("error {error}"),
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            "finished false",
            "progress 40 downloading",
            "progress 100 -",
            "finished true"
        ]
    );
    assert!(events.lock().iter().all(|e| e.plugin().version.as_deref() == Some("1.0.0")));
}

#[test]
fn test_reporter_outlives_the_request() {
    struct Deferred(Arc<Mutex<Option<(PluginInfo, UpdateReporter)>>>);

    impl PluginUpdater for Deferred {
        fn can_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter) {
            *self.0.lock() = Some((plugin.clone(), reporter.clone()));
        }

        fn do_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter) {
            self.can_update(plugin, reporter);
        }
    }

    let (manager, events) = manager();
    let pending = Arc::new(Mutex::new(None));
    manager.set_updater(Deferred(pending.clone()));

    manager.check_plugin_update("clock").unwrap();
    assert!(events.lock().is_empty());

    let (plugin, reporter) = pending.lock().take().unwrap();
    std::thread::spawn(move || reporter.error(&plugin, "server unreachable"))
        .join()
        .unwrap();

    assert!(matches!(
        &events.lock()[..],
        [UpdateEvent::Error { error, .. }] if error == "server unreachable"
    ));
}

#[test]
fn test_unknown_plugin_is_rejected() {
    let (manager, events) = manager();
    assert!(matches!(
        manager.update_plugin("ghost"),
        Err(AddonError::NotFound { .. })
    ));
    assert!(events.lock().is_empty());
}
