//! Icon lookup in style image folders.

use std::path::PathBuf;

use tracing::warn;

use siding_core::{AddonDescriptor, AddonRegistry, inheritance};

/// Folder inside a style holding its images.
pub const IMAGES_DIR: &str = "images";

/// Result of an icon lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Icon {
    /// An image file on disk.
    File(PathBuf),
    /// Image bytes from an embedded style.
    Data(Vec<u8>),
    /// A desktop icon theme entry.
    Theme(String),
    #[default]
    Null,
}

impl Icon {
    pub fn is_null(&self) -> bool {
        matches!(self, Icon::Null)
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Icon::File(path) => Some(path),
            _ => None,
        }
    }
}

/// Searches `images/<name>.<ext>` in `style`, trying every extension before
/// moving on to the next style of the chain.
pub(crate) fn find(
    registry: &AddonRegistry,
    style: &AddonDescriptor,
    name: &str,
    extensions: &[String],
    use_inheritance: bool,
) -> Icon {
    let probe = |d: &AddonDescriptor| {
        let path = d.path()?;
        extensions.iter().find_map(|ext| {
            let rel = format!("{IMAGES_DIR}/{name}.{ext}");
            if !path.exists(&rel) {
                return None;
            }
            if let Some(file) = path.absolute(&rel) {
                return Some(Icon::File(file));
            }
            match path.read(&rel) {
                Ok(bytes) => Some(Icon::Data(bytes)),
                Err(e) => {
                    warn!(style = %d.name(), icon = %rel, error = %e, "Cannot read icon");
                    None
                }
            }
        })
    };

    let found = if use_inheritance {
        inheritance::resolve(registry, style, probe)
    } else {
        probe(style)
    };
    found.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use siding_core::{AddonPath, EmbeddedResources, ResourceSource};
    use std::sync::Arc;

    #[test]
    fn test_extension_order_within_style() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/open.svg"), "<svg/>").unwrap();
        std::fs::write(dir.path().join("images/open.png"), "png").unwrap();

        let mut registry = AddonRegistry::new();
        registry
            .register(AddonDescriptor::new("style", "S").with_path(AddonPath::directory(dir.path())))
            .unwrap();
        let style = registry.get("style", "S").unwrap();

        let exts = vec!["png".to_string(), "svg".to_string()];
        assert_eq!(
            find(&registry, style, "open", &exts, true),
            Icon::File(dir.path().join("images/open.png"))
        );
        assert!(find(&registry, style, "close", &exts, true).is_null());
    }

    #[test]
    fn test_embedded_icon_is_data() {
        let res = EmbeddedResources::new("builtin").with_file("base/images/app.png", &b"\x89PNG"[..]);
        let mut registry = AddonRegistry::new();
        registry
            .register(
                AddonDescriptor::new("style", "Base")
                    .with_path(AddonPath::new(ResourceSource::Embedded(Arc::new(res)), "base")),
            )
            .unwrap();
        registry
            .register(AddonDescriptor::new("style", "Child").inherits("Base"))
            .unwrap();
        let child = registry.get("style", "Child").unwrap();
        let exts = vec!["png".to_string()];

        assert_eq!(find(&registry, child, "app", &exts, true), Icon::Data(b"\x89PNG".to_vec()));
        assert!(find(&registry, child, "app", &exts, false).is_null());
    }
}
