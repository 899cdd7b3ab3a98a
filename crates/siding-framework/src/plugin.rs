//! The plugin add-on kind.
//!
//! Plugins are discovered from `plugin.ini` files and get cascading
//! activation through the [`AddonManager`]. Updates are delegated to an
//! installable [`PluginUpdater`].

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};
use siding_core::{AddonDescriptor, AddonType, hard_dependencies};

use crate::manager::AddonManager;

/// Kind name for plugins.
pub const PLUGIN_TYPE: &str = "plugin";

/// Metadata file describing a plugin.
pub const PLUGIN_METADATA: &str = "plugin.ini";

/// Declares the plugin kind with the given search paths (in search order).
pub fn plugin_type<I, P>(search_paths: I) -> AddonType
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    search_paths
        .into_iter()
        .fold(AddonType::new(PLUGIN_TYPE, PLUGIN_METADATA), |t, p| {
            t.with_search_path(p)
        })
}

/// A typed, serializable view over a plugin descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub module: String,
    /// `requires` entries in declaration order.
    pub requires: Vec<(String, String)>,
    /// Names of same-kind dependencies that activation cascades to.
    pub dependencies: Vec<String>,
}

impl PluginInfo {
    pub fn from_descriptor(descriptor: &AddonDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            version: descriptor.version().map(str::to_string),
            author: descriptor.author().map(str::to_string),
            description: descriptor.description().map(str::to_string),
            module: descriptor.module().to_string(),
            requires: descriptor
                .requires_table()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            dependencies: hard_dependencies(descriptor)
                .into_iter()
                .map(|k| k.name().to_string())
                .collect(),
        }
    }
}

/// Message reported by [`NoUpdater`].
pub const NO_UPDATER_MESSAGE: &str = "An updater is not installed.";

/// Progress and outcome of a plugin update check or install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// Work is under way.
    Progress {
        plugin: PluginInfo,
        /// 0 to 100.
        percent: u8,
        message: Option<String>,
    },
    /// The check or install finished. `updated` is `false` when the plugin
    /// was already current.
    Finished { plugin: PluginInfo, updated: bool },
    /// The check or install failed.
    Error { plugin: PluginInfo, error: String },
}

impl UpdateEvent {
    pub fn plugin(&self) -> &PluginInfo {
        match self {
            Self::Progress { plugin, .. }
            | Self::Finished { plugin, .. }
            | Self::Error { plugin, .. } => plugin,
        }
    }
}

/// Callback receiving [`UpdateEvent`]s.
pub type UpdateObserver = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Handle an updater reports through. Cheap to clone and `Send`, so an
/// updater may keep it and report from a worker thread later.
#[derive(Clone)]
pub struct UpdateReporter {
    observers: Arc<RwLock<Vec<UpdateObserver>>>,
}

impl UpdateReporter {
    pub(crate) fn new(observers: Arc<RwLock<Vec<UpdateObserver>>>) -> Self {
        Self { observers }
    }

    pub fn progress(&self, plugin: &PluginInfo, percent: u8, message: Option<&str>) {
        self.emit(UpdateEvent::Progress {
            plugin: plugin.clone(),
            percent: percent.min(100),
            message: message.map(str::to_string),
        });
    }

    pub fn finished(&self, plugin: &PluginInfo, updated: bool) {
        if updated {
            info!(plugin = %plugin.name, "Plugin updated; takes effect after restart");
        } else {
            debug!(plugin = %plugin.name, "Plugin is up to date");
        }
        self.emit(UpdateEvent::Finished {
            plugin: plugin.clone(),
            updated,
        });
    }

    pub fn error(&self, plugin: &PluginInfo, error: impl std::fmt::Display) {
        let error = error.to_string();
        warn!(plugin = %plugin.name, error = %error, "Plugin update failed");
        self.emit(UpdateEvent::Error {
            plugin: plugin.clone(),
            error,
        });
    }

    fn emit(&self, event: UpdateEvent) {
        let observers: Vec<UpdateObserver> = self.observers.read().clone();
        for observer in observers {
            observer(&event);
        }
    }
}

impl std::fmt::Debug for UpdateReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateReporter")
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

/// Checks for and installs plugin updates.
///
/// Neither method returns an outcome. Each must eventually report exactly
/// one [`finished`](UpdateReporter::finished) or
/// [`error`](UpdateReporter::error), optionally preceded by progress.
pub trait PluginUpdater: Send + Sync {
    /// Begins checking whether `plugin` has an update.
    fn can_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter);

    /// Begins downloading and installing an update for `plugin`.
    fn do_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter);
}

/// The updater installed until the application provides one. Every request
/// fails with [`NO_UPDATER_MESSAGE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUpdater;

impl PluginUpdater for NoUpdater {
    fn can_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter) {
        reporter.error(plugin, NO_UPDATER_MESSAGE);
    }

    fn do_update(&self, plugin: &PluginInfo, reporter: &UpdateReporter) {
        reporter.error(plugin, NO_UPDATER_MESSAGE);
    }
}

/// Every registered plugin, in registration order.
pub fn plugins(manager: &AddonManager) -> Vec<PluginInfo> {
    manager
        .registry()
        .all(PLUGIN_TYPE)
        .map(PluginInfo::from_descriptor)
        .collect()
}

/// Names of the currently active plugins, in registration order.
pub fn active_plugins(manager: &AddonManager) -> Vec<String> {
    manager
        .active(PLUGIN_TYPE)
        .into_iter()
        .map(|k| k.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plugin_info_view() {
        let desc = AddonDescriptor::new(PLUGIN_TYPE, "clock")
            .with_version("1.0.0")
            .with_author("Jane")
            .requires("__app__", ">=1")
            .requires("timers", "*")
            .requires("style:dark", "*");
        let info = PluginInfo::from_descriptor(&desc);

        assert_eq!(info.module, "clock");
        assert_eq!(info.dependencies, vec!["timers"]);
        assert_eq!(info.requires.len(), 3);
    }

    #[test]
    fn test_plugin_type_search_paths() {
        let spec = plugin_type(["a", "b"]);
        assert_eq!(spec.name(), PLUGIN_TYPE);
        assert_eq!(spec.metadata_file(), PLUGIN_METADATA);
        assert_eq!(spec.sources().len(), 2);
    }
}
