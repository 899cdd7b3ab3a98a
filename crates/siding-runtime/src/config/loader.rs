//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Main config file (`siding.toml`), from the first search path holding one
//! 3. Environment variables (`SIDING_*`)
//! 4. Programmatic merges
//!
//! Command line arguments are applied afterwards with
//! [`InitArgs::apply`](crate::cli::InitArgs::apply).
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `SIDING_` prefix with `__` as separator:
//!
//! - `SIDING_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `SIDING_ADDONS__SAFE_MODE=true` → `addons.safe_mode = true`
//! - `SIDING_PROFILE__NAME=work` → `profile.name = "work"`
//!
//! # Example
//!
//! ```rust,ignore
//! use siding_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./config/siding.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SidingConfig;

/// File names searched in every search path, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["siding.toml", "config.toml"];

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "SIDING_";

/// Layers the configuration sources into one [`SidingConfig`].
pub struct ConfigLoader {
    overrides: Figment,
    /// Directories probed for `siding.toml`, in order.
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Replaces the search when set.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader reading the default search paths and the environment.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Probes `path` for a configuration file. Replaces the default search
    /// paths once any is given.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Probes the working directory.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Probes `<user config dir>/siding`.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("siding"))
        } else {
            self
        }
    }

    /// Reads exactly this file; it must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads `SIDING_*` variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Ignores `SIDING_*` variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically. Every field of
    /// `config` is merged, defaults included.
    pub fn merge(mut self, config: SidingConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Sets a single value by dotted key, e.g. `("addons.safe_mode", true)`.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Merges every source and extracts the configuration.
    pub fn load(self) -> ConfigResult<SidingConfig> {
        let figment = self.build_figment()?;

        let config: SidingConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;

        debug!(
            logging_level = %config.logging.level,
            profile = %config.profile.name,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SidingConfig::default()));

        if let Some(path) = self.config_file.take() {
            if path.exists() {
                info!(path = %path.display(), "Loading configuration file");
                figment = Self::merge_config_file(figment, &path)?;
            } else {
                return Err(ConfigError::FileNotFound(path));
            }
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Reading configuration from the environment");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let overrides = std::mem::take(&mut self.overrides);
        Ok(figment.merge(overrides))
    }

    /// Picks the provider by file extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if self.search_paths.is_empty() {
            let mut paths = Vec::new();
            if let Ok(cwd) = std::env::current_dir() {
                paths.push(cwd);
            }
            if let Some(config_dir) = dirs::config_dir() {
                paths.push(config_dir.join("siding"));
            }
            paths
        } else {
            self.search_paths.clone()
        }
    }

    /// Merges the first configuration file found along the search paths.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let found = self
            .resolve_search_paths()
            .into_iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|path| path.exists());

        match found {
            Some(path) => match Self::merge_config_file(figment.clone(), &path) {
                Ok(merged) => {
                    info!(path = %path.display(), "Loading configuration file");
                    figment = merged;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping configuration file"),
            },
            None => warn!("No configuration file found, using defaults"),
        }
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<SidingConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from a specific file, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<SidingConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config, SidingConfig::default());
        assert_eq!(config.logging.level.as_str(), "info");
    }

    #[test]
    fn test_file_env_and_merge_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "siding.toml",
                r#"
                [profile]
                name = "work"

                [addons]
                plugin_paths = ["extra/plugins"]

                [logging]
                level = "debug"
                "#,
            )?;
            jail.set_env("SIDING_LOGGING__LEVEL", "warn");
            jail.set_env("SIDING_ADDONS__SAFE_MODE", "true");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .set("style.default_style", "Dark")
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.profile.name, "work");
            assert_eq!(config.addons.plugin_paths, vec![PathBuf::from("extra/plugins")]);
            assert_eq!(config.logging.level, LogLevel::Warn);
            assert!(config.addons.safe_mode);
            assert_eq!(config.style.default_style, "Dark");
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new().file("/nonexistent/siding.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
