//! Typed view over a style descriptor.

use serde::Serialize;
use siding_core::AddonDescriptor;

use super::StyleError;

/// Known widget styles: `(toolkit class name, short key)`.
pub const STYLE_KEYS: &[(&str, &str)] = &[
    ("QMotifStyle", "motif"),
    ("QCDEStyle", "cde"),
    ("QCleanlooksStyle", "cleanlooks"),
    ("QGtkStyle", "gtk"),
    ("QMacStyle", "mac"),
    ("QPlastiqueStyle", "plastique"),
    ("QWindowsStyle", "windows"),
    ("QWindowsXPStyle", "windowsxp"),
    ("QWindowsVistaStyle", "windowsvista"),
];

/// Maps a short key or class name (case-insensitive) to the class name.
pub fn widget_style(value: &str) -> Result<&'static str, StyleError> {
    STYLE_KEYS
        .iter()
        .find(|(class, key)| key.eq_ignore_ascii_case(value) || class.eq_ignore_ascii_case(value))
        .map(|(class, _)| *class)
        .ok_or_else(|| StyleError::UnknownWidgetStyle(value.to_string()))
}

/// Maps a class name back to its short key, for persisting.
pub fn widget_style_key(class: &str) -> Option<&'static str> {
    STYLE_KEYS
        .iter()
        .find(|(c, _)| *c == class)
        .map(|(_, key)| *key)
}

/// Style metadata with its type-specific fields parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleInfo {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Enable the translucent window frame where the host supports it.
    pub aero: bool,
    /// Widget style class name; `None` falls back to the profile default.
    pub ui: Option<String>,
    pub inherits: Vec<String>,
}

impl StyleInfo {
    /// Parses the `aero` and `ui` fields.
    pub fn from_descriptor(descriptor: &AddonDescriptor) -> Result<Self, StyleError> {
        let aero = match descriptor.field("aero") {
            None => false,
            Some(value) => parse_bool(value).ok_or_else(|| StyleError::InvalidValue {
                style: descriptor.name().to_string(),
                key: "aero".to_string(),
                value: value.to_string(),
            })?,
        };
        let ui = match descriptor.field("ui").filter(|v| !v.is_empty()) {
            None => None,
            Some(value) => Some(widget_style(value)?.to_string()),
        };

        Ok(Self {
            name: descriptor.name().to_string(),
            version: descriptor.version().map(str::to_string),
            description: descriptor.description().map(str::to_string),
            aero,
            ui,
            inherits: descriptor.inherits_from().to_vec(),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
