use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use siding_framework::prelude::*;
use siding_framework::{AddonLoader, PLUGIN_TYPE};
use siding_runtime::runtime::{ACTIVE_PLUGINS_KEY, CURRENT_STYLE_KEY, WIDGET_STYLE_KEY};
use siding_runtime::{RuntimeBuilder, SidingRuntime};

#[derive(Default)]
struct Host {
    widget_style: Mutex<Option<String>>,
}

impl StyleHost for Host {
    fn set_widget_style(&self, style: Option<&str>) {
        *self.widget_style.lock() = style.map(str::to_string);
    }

    fn set_application_stylesheet(&self, _qss: &str) {}

    fn current_widget_style(&self) -> Option<String> {
        Some("QPlastiqueStyle".to_string())
    }
}

struct Marker;

impl Addon for Marker {}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn app_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "plugins/clock/plugin.ini", "[plugin]\nname = clock\n");
    write(
        dir.path(),
        "plugins/alarm/plugin.ini",
        "[plugin]\nname = alarm\n\n[requires]\nclock = *\n",
    );
    write(dir.path(), "styles/default/style.ini", "[style]\nname = default\n");
    write(dir.path(), "styles/dark/style.ini", "[style]\nname = Dark\n");
    dir
}

fn builder(root: &Path) -> RuntimeBuilder {
    let mut loader = AddonLoader::new();
    for module in ["clock", "alarm"] {
        loader.register(PLUGIN_TYPE, module, |_| Ok(Box::new(Marker)));
    }
    SidingRuntime::builder()
        .search_path(root)
        .without_env()
        .set("application.root_path", root)
        .set("profile.portable", true)
        .loader(loader)
}

#[test]
fn test_state_persists_across_runs() {
    let root = app_root();

    let host = Arc::new(Host::default());
    let runtime = builder(root.path())
        .args(["--fullscreen", "--style", "Dark"])
        .build(host.clone())
        .unwrap();

    assert_eq!(runtime.profile().path(), root.path().join("Profiles").join("default"));
    assert_eq!(runtime.styles().active().as_deref(), Some("Dark"));
    assert_eq!(host.widget_style.lock().as_deref(), Some("QPlastiqueStyle"));
    assert_eq!(runtime.profile().get(WIDGET_STYLE_KEY), Some("plastique"));
    assert!(runtime.addons().active(PLUGIN_TYPE).is_empty());

    runtime.set_plugin_active("alarm", true).unwrap();
    assert!(runtime.addons().is_active(PLUGIN_TYPE, "clock"));
    assert_eq!(runtime.profile().get(ACTIVE_PLUGINS_KEY), Some("alarm"));
    assert_eq!(runtime.profile().get(CURRENT_STYLE_KEY), Some("Dark"));
    runtime.shutdown().unwrap();
    assert!(!runtime.addons().is_active(PLUGIN_TYPE, "alarm"));
    drop(runtime);

    let runtime = builder(root.path()).build(Arc::new(Host::default())).unwrap();
    assert!(runtime.addons().is_active(PLUGIN_TYPE, "alarm"));
    assert!(runtime.addons().is_implicit(PLUGIN_TYPE, "clock"));
    assert_eq!(runtime.styles().active().as_deref(), Some("Dark"));
}

#[test]
fn test_safe_mode_activates_nothing() {
    let root = app_root();
    let profile = root.path().join("Profiles").join("default");
    write(&profile, "settings.ini", "[siding]\nplugins/active = clock\n");

    let runtime = builder(root.path())
        .args(["--safe-mode"])
        .build(Arc::new(Host::default()))
        .unwrap();

    assert!(runtime.is_safe_mode());
    assert_eq!(runtime.profile().get_list(ACTIVE_PLUGINS_KEY), vec!["clock"]);
    assert!(runtime.addons().active(PLUGIN_TYPE).is_empty());
    assert_eq!(runtime.styles().active(), None);
}

#[test]
fn test_unknown_style_falls_back_to_default() {
    let root = app_root();

    let runtime = builder(root.path())
        .args(["--style", "Missing"])
        .build(Arc::new(Host::default()))
        .unwrap();

    assert_eq!(runtime.styles().active().as_deref(), Some("default"));
}

#[test]
fn test_missing_source_is_rejected() {
    let root = app_root();

    let result = builder(root.path())
        .args(["--source", "/nonexistent/siding/source"])
        .build(Arc::new(Host::default()));

    assert!(matches!(
        result,
        Err(siding_runtime::RuntimeError::Config(
            siding_runtime::ConfigError::MissingPath { .. }
        ))
    ));
}
