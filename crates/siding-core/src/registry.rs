//! The add-on registry: the single source of truth for discovered add-ons.
//!
//! [`AddonRegistry`] stores descriptors per kind in registration order and
//! owns all mutable per-add-on bookkeeping:
//!
//! - lifecycle [`AddonState`], the `loaded` flag and the `implicit` flag,
//! - the reverse dependency index (`needed_by`), kept as an adjacency map
//!   from an add-on to the ordered set of active add-ons requiring it,
//! - the blacklist and the host application version.
//!
//! The registry performs no cascading itself; the activation state machine in
//! `siding-framework` drives it through the bookkeeping methods below.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::descriptor::{AddonDescriptor, AddonKey};
use crate::error::{AddonError, AddonResult};
use crate::metadata::parse_metadata;
use crate::source::{AddonPath, ResourceSource};

/// Lifecycle state of a registered add-on.
///
/// ```text
/// Inactive ──activate──► Activating ──► Active
///    ▲                                    │
///    └──────── Deactivating ◄──deactivate─┘
/// ```
///
/// The transient states make re-entrant calls during a cascade idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddonState {
    #[default]
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl AddonState {
    /// `true` for `Active` and `Activating`.
    pub fn is_engaged(self) -> bool {
        matches!(self, Self::Active | Self::Activating)
    }
}

/// Declaration of an add-on kind and where to discover it.
#[derive(Debug, Clone)]
pub struct AddonType {
    name: String,
    metadata_file: String,
    sources: Vec<ResourceSource>,
}

impl AddonType {
    /// Declares a kind whose add-ons are described by `metadata_file`
    /// (for example `style.ini`).
    pub fn new(name: impl Into<String>, metadata_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata_file: metadata_file.into(),
            sources: Vec::new(),
        }
    }

    /// Adds a directory to scan during discovery.
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ResourceSource::Directory(path.into()));
        self
    }

    /// Adds an arbitrary source (for example embedded resources).
    pub fn with_source(mut self, source: ResourceSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata_file(&self) -> &str {
        &self.metadata_file
    }

    /// Sources in search order.
    pub fn sources(&self) -> &[ResourceSource] {
        &self.sources
    }
}

struct AddonEntry {
    descriptor: Arc<AddonDescriptor>,
    state: AddonState,
    loaded: bool,
    implicit: bool,
}

struct TypeTable {
    spec: AddonType,
    entries: Vec<AddonEntry>,
    index: HashMap<String, usize>,
}

impl TypeTable {
    fn new(spec: AddonType) -> Self {
        Self {
            spec,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

/// Registry of every known add-on, grouped by kind.
#[derive(Default)]
pub struct AddonRegistry {
    types: IndexMap<String, TypeTable>,
    dependents: HashMap<AddonKey, IndexSet<AddonKey>>,
    blacklist: HashSet<AddonKey>,
    app_version: Option<String>,
}

impl AddonRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Types ───────────────────────────────────────────────────────────────

    /// Declares an add-on kind, replacing the search configuration if the
    /// kind already exists. Registered descriptors are kept.
    pub fn add_type(&mut self, spec: AddonType) {
        match self.types.get_mut(spec.name()) {
            Some(table) => table.spec = spec,
            None => {
                debug!(addon_type = %spec.name(), "Add-on type declared");
                self.types.insert(spec.name().to_string(), TypeTable::new(spec));
            }
        }
    }

    /// Returns the declaration of a kind.
    pub fn addon_type(&self, name: &str) -> Option<&AddonType> {
        self.types.get(name).map(|t| &t.spec)
    }

    /// Names of all declared kinds, in declaration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    // ─── Registration & lookup ───────────────────────────────────────────────

    /// Registers a descriptor.
    ///
    /// Fails with [`AddonError::DuplicateName`] if the name is taken within
    /// the kind. Undeclared kinds are declared implicitly.
    pub fn register(&mut self, descriptor: AddonDescriptor) -> AddonResult<AddonKey> {
        let key = descriptor.key().clone();
        let table = self
            .types
            .entry(key.addon_type().to_string())
            .or_insert_with(|| {
                TypeTable::new(AddonType::new(key.addon_type(), format!("{}.ini", key.addon_type())))
            });

        if table.index.contains_key(key.name()) {
            return Err(AddonError::DuplicateName {
                addon_type: key.addon_type().to_string(),
                name: key.name().to_string(),
            });
        }

        table.index.insert(key.name().to_string(), table.entries.len());
        table.entries.push(AddonEntry {
            descriptor: Arc::new(descriptor),
            state: AddonState::Inactive,
            loaded: false,
            implicit: false,
        });
        debug!(addon = %key, "Add-on registered");
        Ok(key)
    }

    /// Looks up a descriptor by kind and name.
    pub fn get(&self, addon_type: &str, name: &str) -> AddonResult<&AddonDescriptor> {
        self.entry(addon_type, name).map(|e| e.descriptor.as_ref())
    }

    /// Looks up a descriptor by key.
    pub fn get_key(&self, key: &AddonKey) -> AddonResult<&AddonDescriptor> {
        self.get(key.addon_type(), key.name())
    }

    /// Returns a shared handle to a descriptor, for use outside a lock.
    pub fn get_shared(&self, key: &AddonKey) -> AddonResult<Arc<AddonDescriptor>> {
        self.entry(key.addon_type(), key.name())
            .map(|e| Arc::clone(&e.descriptor))
    }

    /// Returns `true` if the add-on is registered.
    pub fn contains(&self, addon_type: &str, name: &str) -> bool {
        self.entry(addon_type, name).is_ok()
    }

    /// Lazily yields every descriptor of `addon_type` matching `predicate`, in
    /// registration order.
    ///
    /// The returned iterator is `Clone`, so the same sequence can be walked
    /// again; an unknown kind yields nothing.
    pub fn find<'a, P>(
        &'a self,
        addon_type: &str,
        predicate: P,
    ) -> impl Iterator<Item = &'a AddonDescriptor> + Clone + use<'a, P>
    where
        P: Fn(&AddonDescriptor) -> bool + Clone + 'a,
    {
        let entries: &'a [AddonEntry] = self
            .types
            .get(addon_type)
            .map(|t| t.entries.as_slice())
            .unwrap_or(&[]);
        entries
            .iter()
            .map(|e| e.descriptor.as_ref())
            .filter(move |d| predicate(d))
    }

    /// Every descriptor of a kind, in registration order.
    pub fn all<'a>(
        &'a self,
        addon_type: &str,
    ) -> impl Iterator<Item = &'a AddonDescriptor> + Clone + use<'a> {
        self.find(addon_type, |_: &AddonDescriptor| true)
    }

    /// Number of add-ons registered under a kind.
    pub fn len(&self, addon_type: &str) -> usize {
        self.types.get(addon_type).map_or(0, |t| t.entries.len())
    }

    /// Returns `true` if no add-ons are registered at all.
    pub fn is_empty(&self) -> bool {
        self.types.values().all(|t| t.entries.is_empty())
    }

    fn entry(&self, addon_type: &str, name: &str) -> AddonResult<&AddonEntry> {
        self.types
            .get(addon_type)
            .and_then(|t| t.index.get(name).map(|&i| &t.entries[i]))
            .ok_or_else(|| AddonError::not_found(addon_type, name))
    }

    fn entry_mut(&mut self, key: &AddonKey) -> AddonResult<&mut AddonEntry> {
        self.types
            .get_mut(key.addon_type())
            .and_then(|t| match t.index.get(key.name()) {
                Some(&i) => Some(&mut t.entries[i]),
                None => None,
            })
            .ok_or_else(|| AddonError::not_found(key.addon_type(), key.name()))
    }

    pub(crate) fn descriptor_mut(&mut self, key: &AddonKey) -> AddonResult<&mut AddonDescriptor> {
        self.entry_mut(key).map(|e| Arc::make_mut(&mut e.descriptor))
    }

    /// Re-reads an add-on's metadata file, keeping its runtime state.
    ///
    /// Descriptors registered without a resource location are left as is.
    /// The reloaded file must keep the same name.
    pub fn reload_metadata(&mut self, key: &AddonKey) -> AddonResult<()> {
        let metadata_file = self
            .addon_type(key.addon_type())
            .map(|t| t.metadata_file().to_string())
            .ok_or_else(|| AddonError::UnknownType(key.addon_type().to_string()))?;
        let current = self.get_shared(key)?;
        let Some(path) = current.path().cloned() else {
            return Ok(());
        };

        let text = path.read_to_string(&metadata_file)?;
        let location = path.display(&metadata_file);
        let fresh = parse_metadata(key.addon_type(), key.name(), &text, &location)?.with_path(path);
        if fresh.name() != key.name() {
            return Err(AddonError::metadata(location, "add-on name changed on reload"));
        }

        self.entry_mut(key)?.descriptor = Arc::new(fresh);
        debug!(addon = %key, "Metadata reloaded");
        Ok(())
    }

    // ─── Lifecycle bookkeeping ───────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn state(&self, key: &AddonKey) -> AddonResult<AddonState> {
        self.entry(key.addon_type(), key.name()).map(|e| e.state)
    }

    /// Sets the lifecycle state.
    pub fn set_state(&mut self, key: &AddonKey, state: AddonState) -> AddonResult<()> {
        self.entry_mut(key)?.state = state;
        Ok(())
    }

    /// Returns `true` if the add-on is `Active`.
    pub fn is_active(&self, key: &AddonKey) -> bool {
        matches!(self.state(key), Ok(AddonState::Active))
    }

    /// Returns `true` once the implementation has been loaded.
    pub fn is_loaded(&self, key: &AddonKey) -> bool {
        self.entry(key.addon_type(), key.name())
            .is_ok_and(|e| e.loaded)
    }

    /// Records whether the implementation is loaded.
    pub fn set_loaded(&mut self, key: &AddonKey, loaded: bool) -> AddonResult<()> {
        self.entry_mut(key)?.loaded = loaded;
        Ok(())
    }

    /// Returns `true` if the add-on was activated only to satisfy a dependent.
    pub fn is_implicit(&self, key: &AddonKey) -> bool {
        self.entry(key.addon_type(), key.name())
            .is_ok_and(|e| e.implicit)
    }

    /// Sets the implicit-activation flag.
    pub fn set_implicit(&mut self, key: &AddonKey, implicit: bool) -> AddonResult<()> {
        self.entry_mut(key)?.implicit = implicit;
        Ok(())
    }

    /// Keys of every add-on of a kind currently in `state`.
    pub fn in_state(&self, addon_type: &str, state: AddonState) -> Vec<AddonKey> {
        self.types
            .get(addon_type)
            .map(|t| {
                t.entries
                    .iter()
                    .filter(|e| e.state == state)
                    .map(|e| e.descriptor.key().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ─── Reverse dependency index ────────────────────────────────────────────

    /// Active add-ons that currently depend on `key`, in insertion order.
    pub fn needed_by(&self, key: &AddonKey) -> Vec<AddonKey> {
        self.dependents
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Records that `dependent` relies on `dependency`. Returns `false` if the
    /// edge was already present.
    pub fn add_dependent(&mut self, dependency: &AddonKey, dependent: &AddonKey) -> bool {
        self.dependents
            .entry(dependency.clone())
            .or_default()
            .insert(dependent.clone())
    }

    /// Removes a reverse edge. Returns `false` if it was absent.
    pub fn remove_dependent(&mut self, dependency: &AddonKey, dependent: &AddonKey) -> bool {
        let Some(set) = self.dependents.get_mut(dependency) else {
            return false;
        };
        let removed = set.shift_remove(dependent);
        if set.is_empty() {
            self.dependents.remove(dependency);
        }
        removed
    }

    // ─── Blacklist & host version ────────────────────────────────────────────

    /// Adds or removes an add-on from the blacklist.
    pub fn set_blacklisted(&mut self, addon_type: &str, name: &str, blacklisted: bool) {
        let key = AddonKey::new(addon_type, name);
        if blacklisted {
            self.blacklist.insert(key);
        } else {
            self.blacklist.remove(&key);
        }
    }

    /// Returns `true` if the add-on is blacklisted.
    pub fn is_blacklisted(&self, key: &AddonKey) -> bool {
        self.blacklist.contains(key)
    }

    /// Sets the host application version checked by `__app__` requirements.
    pub fn set_app_version(&mut self, version: impl Into<String>) {
        self.app_version = Some(version.into());
    }

    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    // ─── Discovery ───────────────────────────────────────────────────────────

    /// Scans the search sources of `addon_type` and registers every add-on
    /// found.
    ///
    /// Unparsable metadata and duplicate names are logged and skipped.
    /// Returns the number of newly registered add-ons.
    pub fn discover(&mut self, addon_type: &str) -> AddonResult<usize> {
        let spec = self
            .addon_type(addon_type)
            .cloned()
            .ok_or_else(|| AddonError::UnknownType(addon_type.to_string()))?;

        let mut found = 0;
        for source in spec.sources() {
            for (path, location) in candidates(source, spec.metadata_file()) {
                match self.register_metadata(&spec, path, &location) {
                    Ok(key) => {
                        found += 1;
                        debug!(addon = %key, location = %location, "Discovered add-on");
                    }
                    Err(e @ AddonError::DuplicateName { .. }) => {
                        warn!(location = %location, error = %e, "Skipping duplicate add-on");
                    }
                    Err(e) => {
                        warn!(location = %location, error = %e, "Skipping invalid add-on");
                    }
                }
            }
        }

        info!(addon_type = %addon_type, count = found, "Add-on discovery finished");
        Ok(found)
    }

    fn register_metadata(
        &mut self,
        spec: &AddonType,
        path: AddonPath,
        location: &str,
    ) -> AddonResult<AddonKey> {
        let text = path.read_to_string(spec.metadata_file())?;
        let default_name = path
            .dir()
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| match path.source() {
                ResourceSource::Directory(root) => root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                ResourceSource::Embedded(res) => Some(res.namespace().to_string()),
            })
            .unwrap_or_else(|| spec.name().to_string());

        let descriptor = parse_metadata(spec.name(), &default_name, &text, location)?.with_path(path);
        self.register(descriptor)
    }
}

/// Lists `(addon directory, display location)` for every metadata file in a
/// source. Directory sources are scanned up to two levels deep.
fn candidates(source: &ResourceSource, metadata_file: &str) -> Vec<(AddonPath, String)> {
    match source {
        ResourceSource::Directory(root) => {
            if !root.is_dir() {
                debug!(path = %root.display(), "Search path does not exist");
                return Vec::new();
            }
            WalkDir::new(root)
                .min_depth(1)
                .max_depth(3)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && e.file_name() == metadata_file)
                .filter_map(|e| {
                    let dir = e.path().parent()?.to_path_buf();
                    let location = e.path().display().to_string();
                    Some((AddonPath::directory(dir), location))
                })
                .collect()
        }
        ResourceSource::Embedded(res) => {
            let mut paths: Vec<&str> = res
                .paths()
                .filter(|p| *p == metadata_file || p.ends_with(&format!("/{metadata_file}")))
                .collect();
            paths.sort_unstable();
            paths
                .into_iter()
                .map(|p| {
                    let dir = p
                        .strip_suffix(metadata_file)
                        .unwrap_or_default()
                        .trim_end_matches('/');
                    (
                        AddonPath::new(source.clone(), dir),
                        format!("{}:{p}", res.namespace()),
                    )
                })
                .collect()
        }
    }
}
