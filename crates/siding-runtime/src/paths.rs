//! Ordered resource directories.
//!
//! Relative resource paths resolve against every source in turn: the profile
//! directory first, then additional sources (most recently added first), then
//! the application root.

use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct PathSources {
    /// Higher priority first; never contains `root`.
    sources: Vec<PathBuf>,
    root: PathBuf,
}

impl PathSources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            sources: Vec::new(),
            root: root.into(),
        }
    }

    /// Adds a source ahead of the existing ones. Duplicates are ignored.
    pub fn add_source(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if path == self.root || self.sources.contains(&path) {
            return;
        }
        debug!(path = %path.display(), "Added path source");
        self.sources.insert(0, path);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every source in search order, the root last.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.sources
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.root.as_path()))
    }

    /// First source that has `rel`.
    pub fn find(&self, rel: impl AsRef<Path>) -> Option<PathBuf> {
        let rel = rel.as_ref();
        self.sources().map(|s| s.join(rel)).find(|p| p.exists())
    }

    pub fn exists(&self, rel: impl AsRef<Path>) -> bool {
        self.find(rel).is_some()
    }

    /// `<source>/<rel>` for every source that has it, in search order.
    pub fn find_all(&self, rel: impl AsRef<Path>) -> Vec<PathBuf> {
        let rel = rel.as_ref();
        self.sources()
            .map(|s| s.join(rel))
            .filter(|p| p.exists())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_profile_shadows_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let profile = dir.path().join("profile");
        fs::create_dir_all(root.join("styles")).unwrap();
        fs::create_dir_all(profile.join("styles")).unwrap();
        fs::write(root.join("only-root.txt"), "").unwrap();

        let mut paths = PathSources::new(&root);
        paths.add_source(&profile);
        paths.add_source(&profile);

        assert_eq!(paths.find("styles"), Some(profile.join("styles")));
        assert_eq!(paths.find("only-root.txt"), Some(root.join("only-root.txt")));
        assert_eq!(
            paths.find_all("styles"),
            vec![profile.join("styles"), root.join("styles")]
        );
        assert!(!paths.exists("missing"));
        assert_eq!(paths.sources().count(), 2);
    }
}
