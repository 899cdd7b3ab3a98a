//! Add-on descriptors: the static metadata of a discovered add-on.
//!
//! A descriptor never carries runtime state. Activation state, the loaded
//! flag and reverse dependency edges are owned by the
//! [`AddonRegistry`](crate::registry::AddonRegistry).

use indexmap::IndexMap;

use crate::source::AddonPath;

/// Requirement key that refers to the host application itself.
pub const APP_REQUIREMENT: &str = "__app__";

/// Requirement value meaning "any version".
pub const ANY_VERSION: &str = "*";

// ─── AddonKey ─────────────────────────────────────────────────────────────────

/// Identifies an add-on by kind and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddonKey {
    addon_type: String,
    name: String,
}

impl AddonKey {
    /// Creates a key.
    pub fn new(addon_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            addon_type: addon_type.into(),
            name: name.into(),
        }
    }

    /// The add-on kind.
    pub fn addon_type(&self) -> &str {
        &self.addon_type
    }

    /// The add-on name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for AddonKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addon_type, self.name)
    }
}

// ─── Requirement ──────────────────────────────────────────────────────────────

/// One parsed entry of an add-on's `requires` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement<'a> {
    /// `__app__`: a constraint on the host application version.
    App {
        /// Version requirement.
        spec: &'a str,
    },
    /// A dependency on an add-on of the same kind; activation cascades to it.
    Hard {
        /// Dependency name.
        name: &'a str,
        /// Version requirement.
        spec: &'a str,
    },
    /// A `type:name` dependency on another kind. Advisory only.
    Soft {
        /// Kind of the dependency.
        addon_type: &'a str,
        /// Dependency name.
        name: &'a str,
        /// Version requirement.
        spec: &'a str,
    },
}

impl<'a> Requirement<'a> {
    /// Classifies a `requires` key relative to the owning add-on's kind.
    pub fn parse(own_type: &str, key: &'a str, spec: &'a str) -> Self {
        if key == APP_REQUIREMENT {
            return Self::App { spec };
        }
        match key.split_once(':') {
            Some((addon_type, name)) if addon_type == own_type => Self::Hard { name, spec },
            Some((addon_type, name)) => Self::Soft {
                addon_type,
                name,
                spec,
            },
            None => Self::Hard { name: key, spec },
        }
    }
}

// ─── AddonDescriptor ──────────────────────────────────────────────────────────

/// Metadata describing one add-on.
///
/// Built either by [`parse_metadata`](crate::metadata::parse_metadata) during
/// discovery or programmatically:
///
/// ```rust,ignore
/// let desc = AddonDescriptor::new("plugin", "clock")
///     .with_version("1.2.0")
///     .requires("timers", "^1")
///     .inherits("base");
/// ```
#[derive(Debug, Clone)]
pub struct AddonDescriptor {
    key: AddonKey,
    version: Option<String>,
    description: Option<String>,
    author: Option<String>,
    module: Option<String>,
    requires: IndexMap<String, String>,
    inherits: Vec<String>,
    path: Option<AddonPath>,
    fields: IndexMap<String, String>,
}

impl AddonDescriptor {
    /// Creates a descriptor with no metadata besides its identity.
    pub fn new(addon_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: AddonKey::new(addon_type, name),
            version: None,
            description: None,
            author: None,
            module: None,
            requires: IndexMap::new(),
            inherits: Vec::new(),
            path: None,
            fields: IndexMap::new(),
        }
    }

    /// Sets the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the implementation module name.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets the resource location.
    pub fn with_path(mut self, path: AddonPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds a `requires` entry.
    pub fn requires(mut self, key: impl Into<String>, spec: impl Into<String>) -> Self {
        self.requires.insert(key.into(), spec.into());
        self
    }

    /// Appends a parent to the inheritance chain.
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits.push(parent.into());
        self
    }

    /// Sets a type-specific metadata field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> &AddonKey {
        &self.key
    }

    pub fn addon_type(&self) -> &str {
        self.key.addon_type()
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// The factory name used to load the implementation; defaults to the name.
    pub fn module(&self) -> &str {
        self.module.as_deref().unwrap_or_else(|| self.key.name())
    }

    /// Raw `requires` table in declaration order.
    pub fn requires_table(&self) -> &IndexMap<String, String> {
        &self.requires
    }

    /// Parsed requirements in declaration order.
    pub fn requirements(&self) -> impl Iterator<Item = Requirement<'_>> {
        self.requires
            .iter()
            .map(|(key, spec)| Requirement::parse(self.key.addon_type(), key, spec))
    }

    /// Parent names, highest priority first.
    pub fn inherits_from(&self) -> &[String] {
        &self.inherits
    }

    pub(crate) fn clear_inherits(&mut self) {
        self.inherits.clear();
    }

    pub fn path(&self) -> Option<&AddonPath> {
        self.path.as_ref()
    }

    /// Looks up a type-specific metadata field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// All type-specific fields in declaration order.
    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }
}
