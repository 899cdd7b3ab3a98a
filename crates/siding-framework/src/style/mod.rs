//! The style add-on kind.
//!
//! A style is a data-only add-on: a directory (or embedded tree) with a
//! `style.ini`, an `application.qss` stylesheet and an `images/` folder. Styles
//! inherit from each other; stylesheets, images and `style.ini` values missing
//! from a style are looked up along its inheritance chain.
//!
//! Exactly one style is current at a time. [`StyleManager`] makes a style
//! current and pushes it into the host application through [`StyleHost`].

mod icon;
mod info;
mod qss;
mod sheets;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use siding_core::{AddonError, AddonKey, AddonState, AddonType, inheritance};

use crate::manager::AddonManager;

pub use icon::Icon;
pub use info::{STYLE_KEYS, StyleInfo, widget_style, widget_style_key};
pub use sheets::StyledWidget;

use qss::Preprocessor;
use sheets::ManagedWidgets;

/// Kind name for styles.
pub const STYLE_TYPE: &str = "style";

/// Metadata file describing a style.
pub const STYLE_METADATA: &str = "style.ini";

/// Stylesheet applied to the whole application.
pub const APPLICATION_QSS: &str = "application.qss";

/// Image formats searched when an icon request names none.
pub const DEFAULT_IMAGE_FORMATS: &[&str] = &["png", "svg", "jpg", "jpeg", "gif", "bmp", "ico"];

/// Errors raised by the style system.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error(transparent)]
    Addon(#[from] AddonError),

    #[error("unknown widget style '{0}'")]
    UnknownWidgetStyle(String),

    #[error("style '{style}': invalid value '{value}' for '{key}'")]
    InvalidValue {
        style: String,
        key: String,
        value: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Declares the style kind with the given search paths (in search order).
pub fn style_type<I, P>(search_paths: I) -> AddonType
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    search_paths
        .into_iter()
        .fold(AddonType::new(STYLE_TYPE, STYLE_METADATA), |t, p| {
            t.with_search_path(p)
        })
}

/// The host application's styling surface.
///
/// Implementations wrap the GUI toolkit. All methods take `&self`; hosts use
/// interior mutability where they need it.
pub trait StyleHost: Send + Sync {
    /// Switches the widget style. `None` restores the toolkit default.
    fn set_widget_style(&self, style: Option<&str>);

    /// Installs the application-wide stylesheet.
    fn set_application_stylesheet(&self, qss: &str);

    /// Turns translucent window frames on or off.
    fn set_aero(&self, _enabled: bool) {}

    /// Whether translucent window frames are currently in effect.
    fn aero_active(&self) -> bool {
        false
    }

    /// Whether the desktop icon theme provides `name`.
    fn has_theme_icon(&self, _name: &str) -> bool {
        false
    }

    /// Class name of the widget style in use before any style was applied.
    fn current_widget_style(&self) -> Option<String> {
        None
    }

    /// Image formats the host can decode, in preference order.
    fn supported_image_formats(&self) -> Vec<String> {
        DEFAULT_IMAGE_FORMATS.iter().map(|f| f.to_string()).collect()
    }
}

/// Called after a style is applied or reapplied.
pub type ReloadListener = Arc<dyn Fn(&StyleInfo) + Send + Sync>;

/// Owns the current style and applies it to the host.
pub struct StyleManager {
    addons: Arc<AddonManager>,
    host: Arc<dyn StyleHost>,
    cache_dir: PathBuf,
    current: RwLock<Option<String>>,
    default_widget_style: RwLock<Option<String>>,
    widgets: Mutex<ManagedWidgets>,
    listeners: RwLock<Vec<ReloadListener>>,
}

impl StyleManager {
    /// Creates a manager with no current style. Decoded and extracted
    /// stylesheet resources are written below `cache_dir`.
    pub fn new(
        addons: Arc<AddonManager>,
        host: Arc<dyn StyleHost>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            addons,
            host,
            cache_dir: cache_dir.into(),
            current: RwLock::new(None),
            default_widget_style: RwLock::new(None),
            widgets: Mutex::new(ManagedWidgets::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn addons(&self) -> &Arc<AddonManager> {
        &self.addons
    }

    pub fn host(&self) -> &Arc<dyn StyleHost> {
        &self.host
    }

    /// Widget style used when the current style sets no `ui`.
    pub fn set_default_widget_style(&self, style: Option<String>) {
        *self.default_widget_style.write() = style;
    }

    pub fn default_widget_style(&self) -> Option<String> {
        self.default_widget_style.read().clone()
    }

    /// Name of the current style.
    pub fn active(&self) -> Option<String> {
        self.current.read().clone()
    }

    /// Registers a listener run after every (re)application of a style.
    pub fn on_style_reloaded<F>(&self, listener: F)
    where
        F: Fn(&StyleInfo) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    // ─── Activation ──────────────────────────────────────────────────────────

    /// Makes `name` the current style and applies it, or reapplies it if it
    /// is already current.
    ///
    /// The style's inheritance chain is validated first; a self-referencing
    /// or cyclic chain is truncated and reported, not rejected.
    pub fn activate_style(&self, name: &str) -> Result<(), StyleError> {
        let key = AddonKey::new(STYLE_TYPE, name);
        self.addons.validate_inheritance(STYLE_TYPE, name)?;
        let descriptor = self.addons.descriptor(STYLE_TYPE, name)?;

        let blacklisted = self.addons.registry().is_blacklisted(&key);
        if blacklisted && !self.addons.policy().ignore_blacklist {
            return Err(AddonError::load(key, "style is blacklisted").into());
        }
        let info = StyleInfo::from_descriptor(&descriptor)?;

        let previous = self.current.write().replace(name.to_string());
        {
            let mut registry = self.addons.registry_mut();
            if let Some(previous) = previous.as_deref().filter(|p| *p != name) {
                registry.set_state(&AddonKey::new(STYLE_TYPE, previous), AddonState::Inactive)?;
            }
            registry.set_state(&key, AddonState::Active)?;
            registry.set_loaded(&key, true)?;
        }

        self.apply(&info);
        Ok(())
    }

    /// Re-reads `style.ini` of `style` (or of the current style) and
    /// reapplies the current style.
    pub fn reload(&self, style: Option<&str>) -> Result<(), StyleError> {
        let current = self.active();
        if let Some(name) = style.or(current.as_deref()) {
            let key = AddonKey::new(STYLE_TYPE, name);
            self.addons.registry_mut().reload_metadata(&key)?;
        }
        match current {
            Some(current) => self.activate_style(&current),
            None => Ok(()),
        }
    }

    fn apply(&self, info: &StyleInfo) {
        info!(style = %info.name, "Applying style");

        self.host.set_aero(info.aero);
        let widget_style = info.ui.clone().or_else(|| self.default_widget_style());
        self.host.set_widget_style(widget_style.as_deref());
        self.host
            .set_application_stylesheet(&self.load_qss(APPLICATION_QSS, Some(&info.name)));

        let widgets = self.widgets.lock().live();
        for (widget, sheets) in widgets {
            self.restyle(widget.as_ref(), &sheets);
        }

        let listeners: Vec<ReloadListener> = self.listeners.read().clone();
        for listener in listeners {
            listener(info);
        }
    }

    // ─── Resources ───────────────────────────────────────────────────────────

    /// Reads and preprocesses the stylesheet `name` of `style` (or of the
    /// current style). Returns an empty stylesheet if it cannot be found.
    pub fn load_qss(&self, name: &str, style: Option<&str>) -> String {
        let Some(style) = style.map(str::to_string).or_else(|| self.active()) else {
            return String::new();
        };
        let aero = self.host.aero_active();

        let registry = self.addons.registry();
        match registry.get(STYLE_TYPE, &style) {
            Ok(descriptor) => {
                Preprocessor::new(&registry, &self.cache_dir, aero).load(name, descriptor)
            }
            Err(e) => {
                warn!(style = %style, file = %name, error = %e, "Cannot load stylesheet");
                String::new()
            }
        }
    }

    /// Looks up a `style.ini` value of `style` (or of the current style),
    /// falling back along the inheritance chain.
    pub fn style_value(&self, key: &str, style: Option<&str>) -> Option<String> {
        let style = style.map(str::to_string).or_else(|| self.active())?;
        let registry = self.addons.registry();
        let descriptor = registry.get(STYLE_TYPE, &style).ok()?;
        inheritance::resolve(&registry, descriptor, |d| d.field(key).map(str::to_string))
    }

    /// Finds the icon `name` in `style` (or the current style).
    ///
    /// `images/<name>.<ext>` is tried for every extension (the host's
    /// supported formats when `extensions` is empty), then along the
    /// inheritance chain when `use_inheritance` is set, then in the desktop
    /// icon theme when `allow_theme` is set.
    pub fn icon(
        &self,
        name: &str,
        extensions: &[&str],
        style: Option<&str>,
        use_inheritance: bool,
        allow_theme: bool,
    ) -> Result<Icon, StyleError> {
        let Some(style) = style.map(str::to_string).or_else(|| self.active()) else {
            return Ok(Icon::Null);
        };
        let extensions: Vec<String> = if extensions.is_empty() {
            self.host.supported_image_formats()
        } else {
            extensions.iter().map(|e| e.to_string()).collect()
        };

        let found = {
            let registry = self.addons.registry();
            let descriptor = registry.get(STYLE_TYPE, &style)?;
            icon::find(&registry, descriptor, name, &extensions, use_inheritance)
        };
        if !found.is_null() {
            return Ok(found);
        }

        if allow_theme && self.host.has_theme_icon(name) {
            return Ok(Icon::Theme(name.to_string()));
        }
        debug!(style = %style, icon = %name, "Icon not found");
        Ok(Icon::Null)
    }

    // ─── Managed widgets ─────────────────────────────────────────────────────

    /// Appends stylesheets to a widget and restyles it. The widget is then
    /// restyled whenever a style is applied, for as long as it is alive.
    ///
    /// Entries prefixed with `data:` are raw stylesheet text. A stylesheet
    /// the widget carried before it was first managed is kept as such an
    /// entry.
    pub fn apply_stylesheet<W, S>(&self, widget: &Arc<W>, paths: &[S])
    where
        W: StyledWidget + 'static,
        S: AsRef<str>,
    {
        let widget: Arc<dyn StyledWidget> = widget.clone();
        let sheets = self
            .widgets
            .lock()
            .add(&widget, paths.iter().map(|p| p.as_ref().to_string()));
        self.restyle(widget.as_ref(), &sheets);
    }

    /// Stylesheet entries currently applied to a widget.
    pub fn list_stylesheets<W>(&self, widget: &Arc<W>) -> Vec<String>
    where
        W: StyledWidget + 'static,
    {
        let widget: Arc<dyn StyledWidget> = widget.clone();
        self.widgets.lock().list(&widget)
    }

    /// Removes stylesheet entries from a widget and restyles it. With no
    /// entries given, every stylesheet is removed. A widget left without
    /// stylesheets is no longer managed.
    pub fn remove_stylesheet<W, S>(&self, widget: &Arc<W>, paths: &[S])
    where
        W: StyledWidget + 'static,
        S: AsRef<str>,
    {
        let widget: Arc<dyn StyledWidget> = widget.clone();
        let remaining = self
            .widgets
            .lock()
            .remove(&widget, paths.iter().map(|p| p.as_ref()));
        if let Some(sheets) = remaining {
            self.restyle(widget.as_ref(), &sheets);
        }
    }

    fn restyle(&self, widget: &dyn StyledWidget, sheets: &[String]) {
        let qss = sheets::compose(sheets, |path| self.load_qss(path, None));
        widget.set_style_sheet(&qss);
    }
}

impl std::fmt::Debug for StyleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleManager")
            .field("current", &*self.current.read())
            .field("cache_dir", &self.cache_dir)
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use siding_core::{AddonDescriptor, AddonPath};
    use std::fs;

    #[derive(Default)]
    struct RecordingHost {
        widget_style: Mutex<Option<String>>,
        aero: Mutex<bool>,
        qss: Mutex<String>,
    }

    impl StyleHost for RecordingHost {
        fn set_widget_style(&self, style: Option<&str>) {
            *self.widget_style.lock() = style.map(str::to_string);
        }

        fn set_application_stylesheet(&self, qss: &str) {
            *self.qss.lock() = qss.to_string();
        }

        fn set_aero(&self, enabled: bool) {
            *self.aero.lock() = enabled;
        }
    }

    fn setup(root: &std::path::Path) -> (StyleManager, Arc<RecordingHost>) {
        let addons = Arc::new(AddonManager::with_loader(Default::default()));
        for (name, parent, qss, fields) in [
            ("Base", None, "base {}", vec![("accent", "blue")]),
            ("Dark", Some("Base"), "@import \"application.qss\";\ndark {}", vec![("ui", "plastique"), ("aero", "true")]),
        ] {
            let dir = root.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(APPLICATION_QSS), qss).unwrap();
            let mut desc = AddonDescriptor::new(STYLE_TYPE, name).with_path(AddonPath::directory(&dir));
            if let Some(parent) = parent {
                desc = desc.inherits(parent);
            }
            for (k, v) in fields {
                desc = desc.with_field(k, v);
            }
            addons.register(desc).unwrap();
        }

        let host = Arc::new(RecordingHost::default());
        let styles = StyleManager::new(addons, host.clone(), root.join("cache"));
        (styles, host)
    }

    #[test]
    fn test_activate_applies_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let (styles, host) = setup(dir.path());
        let reloaded = Arc::new(Mutex::new(Vec::new()));
        let seen = reloaded.clone();
        styles.on_style_reloaded(move |info| seen.lock().push(info.name.clone()));
        styles.set_default_widget_style(Some("QWindowsStyle".to_string()));

        styles.activate_style("Dark").unwrap();
        assert_eq!(styles.active().as_deref(), Some("Dark"));
        assert_eq!(host.widget_style.lock().as_deref(), Some("QPlastiqueStyle"));
        assert!(*host.aero.lock());
        assert_eq!(*host.qss.lock(), "base {}\ndark {}");

        styles.activate_style("Base").unwrap();
        assert_eq!(host.widget_style.lock().as_deref(), Some("QWindowsStyle"));
        assert_eq!(styles.addons().active(STYLE_TYPE), vec![AddonKey::new(STYLE_TYPE, "Base")]);
        assert_eq!(*reloaded.lock(), vec!["Dark", "Base"]);
    }

    #[test]
    fn test_style_value_uses_inheritance() {
        let dir = tempfile::tempdir().unwrap();
        let (styles, _) = setup(dir.path());
        styles.activate_style("Dark").unwrap();

        assert_eq!(styles.style_value("accent", None).as_deref(), Some("blue"));
        assert_eq!(styles.style_value("ui", Some("Base")), None);
    }

    #[test]
    fn test_activate_unknown_style() {
        let dir = tempfile::tempdir().unwrap();
        let (styles, _) = setup(dir.path());
        assert!(matches!(
            styles.activate_style("Nope"),
            Err(StyleError::Addon(AddonError::NotFound { .. }))
        ));
        assert_eq!(styles.active(), None);
    }
}
