//! Application initialization.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use siding_runtime::SidingRuntime;
//!
//! let runtime = SidingRuntime::builder()
//!     .args(std::env::args().skip(1))
//!     .build(host)?;
//!
//! runtime.addons().emit_signal("on_ready", &[]);
//! ```
//!
//! Initialization runs in a fixed order: logging, profile, path sources,
//! add-on kinds, discovery, then (unless safe mode is on) the saved plugins
//! and the style.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use siding_core::{AddonResult, DependencyPolicy, ResourceSource};
use siding_framework::plugin::{self, plugin_type};
use siding_framework::style::{STYLE_TYPE, style_type, widget_style, widget_style_key};
use siding_framework::{AddonLoader, AddonManager, PLUGIN_TYPE, StyleHost, StyleManager};
use tracing::{debug, error, info, warn};

use crate::cli::InitArgs;
use crate::config::{ConfigLoader, SidingConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;
use crate::paths::PathSources;
use crate::profile::Profile;

/// Profile key listing the active plugins.
pub const ACTIVE_PLUGINS_KEY: &str = "siding/plugins/active";

/// Profile key naming the current style.
pub const CURRENT_STYLE_KEY: &str = "siding/style/current-style";

/// Profile key holding the host's own widget style.
pub const WIDGET_STYLE_KEY: &str = "siding/style/widget-style";

/// Subdirectory of every path source searched for plugins.
pub const PLUGINS_DIR: &str = "plugins";

/// Subdirectory of every path source searched for styles.
pub const STYLES_DIR: &str = "styles";

/// An initialized application: profile, add-on manager and style manager.
pub struct SidingRuntime {
    config: SidingConfig,
    profile: RwLock<Profile>,
    paths: PathSources,
    addons: Arc<AddonManager>,
    styles: StyleManager,
}

impl std::fmt::Debug for SidingRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidingRuntime")
            .field("profile", &*self.profile.read())
            .field("paths", &self.paths)
            .field("style", &self.styles.active())
            .finish_non_exhaustive()
    }
}

impl SidingRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Initializes a runtime from a loaded configuration, with every
    /// `#[register_addon]` factory available.
    pub fn initialize(config: SidingConfig, host: Arc<dyn StyleHost>) -> RuntimeResult<Self> {
        Self::initialize_with(config, host, AddonLoader::collect_all(), Vec::new(), Vec::new())
    }

    fn initialize_with(
        config: SidingConfig,
        host: Arc<dyn StyleHost>,
        loader: AddonLoader,
        plugin_sources: Vec<ResourceSource>,
        style_sources: Vec<ResourceSource>,
    ) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);
        validate_config(&config)?;

        let profile = Profile::open(&config.profile, &config.application)?;

        let mut paths = PathSources::new(profile.root_path());
        for source in &config.application.sources {
            paths.add_source(source);
        }
        paths.add_source(profile.path());

        let addons = Arc::new(AddonManager::with_loader(loader));
        if let Some(version) = &config.application.version {
            addons.set_app_version(version.clone());
        }
        addons.set_policy(DependencyPolicy {
            ignore_blacklist: config.addons.ignore_blacklist,
        });

        let plugin_spec = plugin_sources.into_iter().fold(
            plugin_type(search_paths(&config.addons.plugin_paths, &paths, PLUGINS_DIR)),
            |spec, source| spec.with_source(source),
        );
        let style_spec = style_sources.into_iter().fold(
            style_type(search_paths(&config.addons.style_paths, &paths, STYLES_DIR)),
            |spec, source| spec.with_source(source),
        );
        addons.add_type(plugin_spec);
        addons.add_type(style_spec);

        addons.discover(PLUGIN_TYPE)?;
        addons.discover(STYLE_TYPE)?;
        for name in &config.addons.blacklist {
            addons.set_blacklisted(PLUGIN_TYPE, name, true);
        }

        let cache_dir = config
            .application
            .cache_dir
            .clone()
            .unwrap_or_else(|| profile.cache_dir());
        let styles = StyleManager::new(addons.clone(), host, cache_dir);

        let runtime = Self {
            config,
            profile: RwLock::new(profile),
            paths,
            addons,
            styles,
        };
        runtime.init_widget_style()?;

        if runtime.config.addons.safe_mode {
            info!("Safe mode is enabled; not activating plugins or styles");
        } else {
            runtime.activate_saved_plugins();
            runtime.activate_initial_style();
        }

        info!(
            profile = %runtime.profile.read().name(),
            plugins = runtime.addons.active(PLUGIN_TYPE).len(),
            style = ?runtime.styles.active(),
            "Runtime initialized"
        );
        Ok(runtime)
    }

    /// Persists the host's widget style and uses the saved one as the
    /// fallback for styles that set no `ui`.
    fn init_widget_style(&self) -> RuntimeResult<()> {
        let mut profile = self.profile.write();
        if let Some(key) = self
            .styles
            .host()
            .current_widget_style()
            .as_deref()
            .and_then(widget_style_key)
        {
            profile.set(WIDGET_STYLE_KEY, key)?;
        }

        let default = profile
            .get(WIDGET_STYLE_KEY)
            .and_then(|value| match widget_style(value) {
                Ok(class) => Some(class.to_string()),
                Err(e) => {
                    warn!(error = %e, "Ignoring saved widget style");
                    None
                }
            });
        self.styles.set_default_widget_style(default);
        Ok(())
    }

    fn activate_saved_plugins(&self) {
        let wanted = self.profile.read().get_list(ACTIVE_PLUGINS_KEY);
        if wanted.is_empty() {
            debug!("No saved plugins to activate");
            return;
        }
        let failures = self.addons.activate_all(PLUGIN_TYPE, &wanted);
        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                requested = wanted.len(),
                "Some saved plugins could not be activated"
            );
        }
    }

    /// Activates the requested style, falling back to the default one.
    fn activate_initial_style(&self) {
        let default = self.config.style.default_style.clone();
        let requested = self
            .config
            .style
            .style
            .clone()
            .or_else(|| self.profile.read().get(CURRENT_STYLE_KEY).map(str::to_string))
            .unwrap_or_else(|| default.clone());

        if let Err(e) = self.styles.activate_style(&requested) {
            error!(style = %requested, error = %e, "Failed to activate style");
            if requested != default
                && let Err(e) = self.styles.activate_style(&default)
            {
                error!(style = %default, error = %e, "Failed to activate default style");
            }
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &SidingConfig {
        &self.config
    }

    pub fn profile(&self) -> RwLockReadGuard<'_, Profile> {
        self.profile.read()
    }

    pub fn profile_mut(&self) -> RwLockWriteGuard<'_, Profile> {
        self.profile.write()
    }

    pub fn paths(&self) -> &PathSources {
        &self.paths
    }

    pub fn addons(&self) -> &Arc<AddonManager> {
        &self.addons
    }

    pub fn styles(&self) -> &StyleManager {
        &self.styles
    }

    pub fn is_safe_mode(&self) -> bool {
        self.config.addons.safe_mode
    }

    // ─── Persisted state ─────────────────────────────────────────────────────

    /// Activates or deactivates a plugin and records the active set in the
    /// profile.
    pub fn set_plugin_active(&self, name: &str, active: bool) -> RuntimeResult<()> {
        let result: AddonResult<()> = self.addons.set_active(PLUGIN_TYPE, name, active);
        self.save_state()?;
        Ok(result?)
    }

    /// Activates a style and records it as the current one.
    pub fn set_style(&self, name: &str) -> RuntimeResult<()> {
        self.styles.activate_style(name)?;
        self.save_state()
    }

    /// Writes the explicitly active plugins and the current style to the
    /// profile and saves it.
    pub fn save_state(&self) -> RuntimeResult<()> {
        let explicit: Vec<String> = plugin::active_plugins(&self.addons)
            .into_iter()
            .filter(|name| !self.addons.is_implicit(PLUGIN_TYPE, name))
            .collect();

        let mut profile = self.profile.write();
        profile.set_list(ACTIVE_PLUGINS_KEY, &explicit)?;
        if let Some(current) = self.styles.active() {
            profile.set(CURRENT_STYLE_KEY, current)?;
        }
        profile.save()?;
        Ok(())
    }

    /// Saves state and deactivates every plugin.
    pub fn shutdown(&self) -> RuntimeResult<()> {
        let saved = self.save_state();
        self.addons.deactivate_all(PLUGIN_TYPE);
        info!("Runtime shut down");
        saved
    }
}

/// `extra` first, then `<source>/<subdir>` for every path source.
fn search_paths(extra: &[PathBuf], paths: &PathSources, subdir: &str) -> Vec<PathBuf> {
    extra
        .iter()
        .cloned()
        .chain(paths.sources().map(|s| s.join(subdir)))
        .collect()
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration, applies command line options and initializes a
/// [`SidingRuntime`].
///
/// ```rust,ignore
/// let runtime = SidingRuntime::builder()
///     .config_file("siding.toml")
///     .args(["--profile", "work"])
///     .build(host)?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    args: Option<Vec<String>>,
    loader: Option<AddonLoader>,
    plugin_sources: Vec<ResourceSource>,
    style_sources: Vec<ResourceSource>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            args: None,
            loader: None,
            plugin_sources: Vec::new(),
            style_sources: Vec::new(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: SidingConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Sets a single configuration value by dotted key.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Command line arguments (without the program name). Unknown ones are
    /// ignored.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the link-time factory table with an explicit loader.
    pub fn loader(mut self, loader: AddonLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Adds a plugin source after the filesystem search paths.
    pub fn plugin_source(mut self, source: ResourceSource) -> Self {
        self.plugin_sources.push(source);
        self
    }

    /// Adds a style source after the filesystem search paths.
    pub fn style_source(mut self, source: ResourceSource) -> Self {
        self.style_sources.push(source);
        self
    }

    pub fn build(self, host: Arc<dyn StyleHost>) -> RuntimeResult<SidingRuntime> {
        let mut config = self.config_loader.load()?;
        if let Some(args) = self.args {
            match InitArgs::parse_known(args) {
                Ok(args) => args.apply(&mut config),
                Err(e) => warn!(error = %e, "Ignoring malformed command line options"),
            }
        }

        SidingRuntime::initialize_with(
            config,
            host,
            self.loader.unwrap_or_else(AddonLoader::collect_all),
            self.plugin_sources,
            self.style_sources,
        )
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_paths_put_configured_paths_first() {
        let mut paths = PathSources::new("/app");
        paths.add_source("/profile");

        let found = search_paths(&[PathBuf::from("/extra")], &paths, PLUGINS_DIR);
        assert_eq!(
            found,
            vec![
                PathBuf::from("/extra"),
                PathBuf::from("/profile/plugins"),
                PathBuf::from("/app/plugins"),
            ]
        );
    }
}
