//! INI metadata files (`plugin.ini`, `style.ini`, ...).
//!
//! ```ini
//! [style]
//! name = Dark
//! version = 1.2
//! inherits = Base, Fallback
//! aero = true
//!
//! [requires]
//! __app__ = >=2.0
//! Base = *
//! ```
//!
//! The main section is named after the add-on kind; `[addon]` and the general
//! section are accepted as fallbacks. Keys other than the common ones are kept
//! as type-specific fields.

use ini::Ini;

use crate::descriptor::AddonDescriptor;
use crate::error::{AddonError, AddonResult};

const COMMON_KEYS: &[&str] = &["name", "version", "description", "author", "module", "inherits"];

/// Parses metadata text into a descriptor.
///
/// `default_name` is used when the file has no `name` key; `location` only
/// appears in error messages.
pub fn parse_metadata(
    addon_type: &str,
    default_name: &str,
    text: &str,
    location: &str,
) -> AddonResult<AddonDescriptor> {
    let ini = Ini::load_from_str(text).map_err(|e| AddonError::metadata(location, e.to_string()))?;

    let main = ini
        .section(Some(addon_type))
        .or_else(|| ini.section(Some("addon")))
        .unwrap_or_else(|| ini.general_section());

    let name = match main.get("name") {
        Some(name) if name.trim().is_empty() => {
            return Err(AddonError::metadata(location, "empty 'name'"));
        }
        Some(name) => name.trim(),
        None => default_name,
    };

    let mut descriptor = AddonDescriptor::new(addon_type, name);
    if let Some(v) = non_empty(main.get("version")) {
        descriptor = descriptor.with_version(v);
    }
    if let Some(v) = non_empty(main.get("description")) {
        descriptor = descriptor.with_description(v);
    }
    if let Some(v) = non_empty(main.get("author")) {
        descriptor = descriptor.with_author(v);
    }
    if let Some(v) = non_empty(main.get("module")) {
        descriptor = descriptor.with_module(v);
    }
    if let Some(parents) = main.get("inherits") {
        for parent in split_list(parents) {
            descriptor = descriptor.inherits(parent);
        }
    }

    for (key, value) in main.iter() {
        if !COMMON_KEYS.contains(&key) {
            descriptor = descriptor.with_field(key, value.trim());
        }
    }

    if let Some(requires) = ini.section(Some("requires")) {
        for (key, spec) in requires.iter() {
            let spec = spec.trim();
            descriptor = descriptor.requires(key.trim(), if spec.is_empty() { "*" } else { spec });
        }
    }

    Ok(descriptor)
}

/// Splits a comma separated list, dropping blanks.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Requirement;
    use pretty_assertions::assert_eq;

    const STYLE: &str = "\
[style]
name = Dark
version = 1.2
description = A dark theme
inherits = Base, , Fallback
aero = true
ui = plastique

[requires]
__app__ = >=2.0
Base =
";

    #[test]
    fn test_parse_full_metadata() {
        let desc = parse_metadata("style", "dark", STYLE, "dark/style.ini").unwrap();

        assert_eq!(desc.name(), "Dark");
        assert_eq!(desc.version(), Some("1.2"));
        assert_eq!(desc.description(), Some("A dark theme"));
        assert_eq!(desc.inherits_from().to_vec(), vec!["Base", "Fallback"]);
        assert_eq!(desc.field("aero"), Some("true"));
        assert_eq!(desc.field("ui"), Some("plastique"));
        assert_eq!(desc.field("name"), None);

        let reqs: Vec<_> = desc.requirements().collect();
        assert_eq!(
            reqs,
            vec![
                Requirement::App { spec: ">=2.0" },
                Requirement::Hard {
                    name: "Base",
                    spec: "*"
                },
            ]
        );
    }

    #[test]
    fn test_name_defaults_to_directory() {
        let desc = parse_metadata("plugin", "clock", "[plugin]\nversion = 1.0.0\n", "x").unwrap();
        assert_eq!(desc.name(), "clock");

        let desc = parse_metadata("plugin", "clock", "version = 1.0.0\n", "x").unwrap();
        assert_eq!(desc.version(), Some("1.0.0"));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = parse_metadata("plugin", "clock", "[plugin]\nname =\n", "clock/plugin.ini")
            .unwrap_err();
        assert!(matches!(err, AddonError::Metadata { .. }));
    }
}
