//! Profiles: a named directory holding per-user settings.
//!
//! Settings live in `<profile>/settings.ini` and are addressed as
//! `group/key`. The first path segment is the INI section and the rest is the
//! key. Keys without a group are kept in the `[General]` section.

use std::fmt;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ApplicationConfig, ProfileConfig};

/// Settings file inside every profile directory.
pub const SETTINGS_FILE: &str = "settings.ini";

/// Directory holding the named profiles below the profile base.
pub const PROFILES_DIR: &str = "Profiles";

/// Section used for keys that carry no group.
const GENERAL_SECTION: &str = "General";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Cannot create profile directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings key: {0:?}")]
    InvalidKey(String),

    #[error("No user data directory is available; use a portable profile or an explicit profile path")]
    NoDataDir,
}

/// An opened profile with its settings loaded.
pub struct Profile {
    name: String,
    portable: bool,
    root_path: PathBuf,
    path: PathBuf,
    settings: Ini,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("portable", &self.portable)
            .field("root_path", &self.root_path)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Profile {
    /// Opens the profile described by `config`, creating its directory.
    ///
    /// The directory is `config.path` when given, otherwise
    /// `<base>/Profiles/<name>` where the base is the application root for
    /// portable profiles and `<user data dir>/<app name>` for the others.
    pub fn open(config: &ProfileConfig, app: &ApplicationConfig) -> Result<Self, ProfileError> {
        let root_path = match &app.root_path {
            Some(root) => root.clone(),
            None => std::env::current_dir().map_err(|source| ProfileError::CreateDir {
                path: PathBuf::from("."),
                source,
            })?,
        };

        let path = match &config.path {
            Some(path) => path.clone(),
            None => {
                let base = if config.portable {
                    root_path.clone()
                } else {
                    dirs::data_dir()
                        .ok_or(ProfileError::NoDataDir)?
                        .join(&app.name)
                };
                base.join(PROFILES_DIR).join(&config.name)
            }
        };

        std::fs::create_dir_all(&path).map_err(|source| ProfileError::CreateDir {
            path: path.clone(),
            source,
        })?;

        let settings = load_settings(&path.join(SETTINGS_FILE))?;
        let profile = Self {
            name: config.name.clone(),
            portable: config.portable,
            root_path,
            path,
            settings,
        };

        info!(profile = %profile.name, path = %profile.path.display(), "Using profile");
        debug!(
            keys = profile.keys().len(),
            groups = profile.settings.sections().flatten().count(),
            "Profile settings loaded"
        );
        Ok(profile)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_portable(&self) -> bool {
        self.portable
    }

    /// Application root directory.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// The profile directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings_file(&self) -> PathBuf {
        self.path.join(SETTINGS_FILE)
    }

    /// Cache directory for extracted style resources.
    pub fn cache_dir(&self) -> PathBuf {
        self.path.join("cache")
    }

    // ─── Settings ────────────────────────────────────────────────────────────

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let (section, name) = split_key(key).ok()?;
        self.settings.get_from(Some(section), &name)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Reads a comma-separated list; missing keys give an empty list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| siding_core::split_list(v).map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ProfileError> {
        let (section, name) = split_key(key)?;
        self.settings
            .with_section(Some(section))
            .set(name, value.into());
        Ok(())
    }

    pub fn set_list<I, S>(&mut self, key: &str, values: I) -> Result<(), ProfileError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.set(key, joined)
    }

    /// Deletes a key, returning its old value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let (section, name) = split_key(key).ok()?;
        let old = self.settings.delete_from(Some(section), &name);
        if self
            .settings
            .section(Some(section))
            .is_some_and(|props| props.is_empty())
        {
            self.settings.delete(Some(section));
        }
        old
    }

    /// Every key in `group/key` form, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .settings
            .iter()
            .filter_map(|(section, props)| section.map(|s| (s, props)))
            .flat_map(|(section, props)| {
                props.iter().map(move |(name, _)| {
                    if section == GENERAL_SECTION {
                        name.to_string()
                    } else {
                        format!("{section}/{name}")
                    }
                })
            })
            .collect();
        keys.sort();
        keys
    }

    /// Writes the settings back to `settings.ini`.
    pub fn save(&self) -> Result<(), ProfileError> {
        let path = self.settings_file();
        self.settings
            .write_to_file(&path)
            .map_err(|source| ProfileError::Write { path, source })?;
        debug!(profile = %self.name, "Profile settings saved");
        Ok(())
    }
}

fn load_settings(path: &Path) -> Result<Ini, ProfileError> {
    if !path.exists() {
        return Ok(Ini::new());
    }
    Ini::load_from_file(path).map_err(|source| ProfileError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Splits `group/a/b` into `("group", "a/b")`; `key` alone goes to `General`.
fn split_key(key: &str) -> Result<(&str, String), ProfileError> {
    let key = key.trim_matches('/');
    if key.is_empty() || key.split('/').any(str::is_empty) {
        return Err(ProfileError::InvalidKey(key.to_string()));
    }
    Ok(match key.split_once('/') {
        Some((section, rest)) => (section, rest.to_string()),
        None => (GENERAL_SECTION, key.to_string()),
    })
}
