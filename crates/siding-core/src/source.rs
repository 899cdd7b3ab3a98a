//! Resource locations for add-ons.
//!
//! An add-on's files live either in a directory on disk or in an embedded
//! namespace compiled into the application. [`AddonPath`] addresses a
//! directory inside one of those sources and resolves relative resource names
//! (`images/foo.png`, `application.qss`) against it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// An in-memory set of files addressed by `/`-separated relative paths.
#[derive(Debug, Default)]
pub struct EmbeddedResources {
    namespace: String,
    files: HashMap<String, Cow<'static, [u8]>>,
}

impl EmbeddedResources {
    /// Creates an empty namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            files: HashMap::new(),
        }
    }

    /// Adds a file; the path is normalized before insertion.
    pub fn with_file(mut self, path: &str, data: impl Into<Cow<'static, [u8]>>) -> Self {
        self.files.insert(normalize(path), data.into());
        self
    }

    /// Namespace name, used for display.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Iterates over every stored path.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(AsRef::as_ref)
    }
}

/// Where an add-on's resources come from.
#[derive(Debug, Clone)]
pub enum ResourceSource {
    /// A directory on the filesystem; relative paths are joined onto it.
    Directory(PathBuf),
    /// A packaged namespace of embedded files.
    Embedded(Arc<EmbeddedResources>),
}

impl ResourceSource {
    /// Returns `true` if the source is backed by real files.
    pub fn is_filesystem(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    fn exists(&self, path: &str) -> bool {
        match self {
            Self::Directory(root) => root.join(path).exists(),
            Self::Embedded(res) => res.get(path).is_some(),
        }
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        match self {
            Self::Directory(root) => std::fs::read(root.join(path)),
            Self::Embedded(res) => res.get(path).map(<[u8]>::to_vec).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}:{path} not found", res.namespace()),
                )
            }),
        }
    }
}

/// A directory inside a [`ResourceSource`] that holds one add-on.
#[derive(Debug, Clone)]
pub struct AddonPath {
    source: ResourceSource,
    dir: String,
}

impl AddonPath {
    /// Creates a path rooted at `dir` (relative to the source root).
    pub fn new(source: ResourceSource, dir: &str) -> Self {
        Self {
            source,
            dir: normalize(dir),
        }
    }

    /// Convenience constructor for an add-on directory on disk.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(ResourceSource::Directory(path.into()), "")
    }

    /// The underlying source.
    pub fn source(&self) -> &ResourceSource {
        &self.source
    }

    /// The add-on directory relative to the source root.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Joins `rel` onto the add-on directory. A leading `/` makes `rel`
    /// relative to the add-on directory regardless of `base`.
    pub fn join(&self, rel: &str) -> String {
        join(&self.dir, rel)
    }

    /// Returns `true` if `rel` exists inside the add-on directory.
    pub fn exists(&self, rel: &str) -> bool {
        self.source.exists(&self.join(rel))
    }

    /// Reads `rel` from the add-on directory.
    pub fn read(&self, rel: &str) -> io::Result<Vec<u8>> {
        self.source.read(&self.join(rel))
    }

    /// Reads `rel` as UTF-8 text.
    pub fn read_to_string(&self, rel: &str) -> io::Result<String> {
        let bytes = self.read(rel)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Absolute filesystem path of `rel`, or `None` for embedded sources.
    pub fn absolute(&self, rel: &str) -> Option<PathBuf> {
        match &self.source {
            ResourceSource::Directory(root) => Some(root.join(self.join(rel))),
            ResourceSource::Embedded(_) => None,
        }
    }

    /// A human readable location for `rel`, used in logs.
    pub fn display(&self, rel: &str) -> String {
        match &self.source {
            ResourceSource::Directory(root) => root.join(self.join(rel)).display().to_string(),
            ResourceSource::Embedded(res) => format!("{}:{}", res.namespace(), self.join(rel)),
        }
    }
}

/// Joins two `/`-separated relative paths and normalizes the result.
pub fn join(base: &str, rel: &str) -> String {
    if base.is_empty() {
        normalize(rel)
    } else {
        normalize(&format!("{base}/{}", rel.trim_start_matches('/')))
    }
}

/// Collapses `.`, `..`, empty segments and backslashes. `..` never climbs
/// above the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_segments() {
        assert_eq!(normalize("a/./b//c/../d"), "a/b/d");
        assert_eq!(normalize("../../x"), "x");
        assert_eq!(normalize("a\\b"), "a/b");
    }

    #[test]
    fn test_embedded_lookup() {
        let res = EmbeddedResources::new("app")
            .with_file("styles/dark/images/go.png", &b"png"[..])
            .with_file("styles/dark/style.ini", &b"[style]"[..]);
        let path = AddonPath::new(ResourceSource::Embedded(Arc::new(res)), "styles/dark");

        assert!(path.exists("images/go.png"));
        assert!(path.exists("/style.ini"));
        assert!(!path.exists("images/stop.png"));
        assert_eq!(path.read("images/go.png").unwrap(), b"png");
        assert!(path.absolute("images/go.png").is_none());
        assert_eq!(path.display("style.ini"), "app:styles/dark/style.ini");
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/a.svg"), "<svg/>").unwrap();

        let path = AddonPath::directory(dir.path());
        assert!(path.exists("images/a.svg"));
        assert_eq!(
            path.absolute("images/a.svg").unwrap(),
            dir.path().join("images/a.svg")
        );
        assert_eq!(path.read_to_string("images/a.svg").unwrap(), "<svg/>");
    }
}
