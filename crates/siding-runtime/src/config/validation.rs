//! Configuration validation utilities.

use std::path::Path;

use super::error::{ConfigError, ConfigResult};
use super::schema::{ApplicationConfig, LogOutput, LoggingConfig, ProfileConfig, SidingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SidingConfig) -> ConfigResult<()> {
    validate_application_config(&config.application)?;
    validate_profile_config(&config.profile)?;
    validate_logging_config(&config.logging)?;

    if config.style.default_style.trim().is_empty() {
        return Err(ConfigError::missing_field("style.default_style"));
    }
    if let Some(style) = &config.style.style
        && style.trim().is_empty()
    {
        return Err(ConfigError::validation("Style name cannot be empty"));
    }

    Ok(())
}

/// Validates application identity and directories.
fn validate_application_config(app: &ApplicationConfig) -> ConfigResult<()> {
    if app.name.trim().is_empty() {
        return Err(ConfigError::missing_field("application.name"));
    }

    if let Some(root) = &app.root_path {
        require_dir("Application root", root)?;
    }
    for source in &app.sources {
        require_dir("Resource source", source)?;
    }

    Ok(())
}

/// Validates the profile name. It becomes a directory name.
fn validate_profile_config(profile: &ProfileConfig) -> ConfigResult<()> {
    let name = profile.name.trim();
    if name.is_empty() {
        return Err(ConfigError::missing_field("profile.name"));
    }

    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ConfigError::validation(format!(
            "Profile name cannot be used as a directory name: {name}"
        )));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation("logging.max_files must be greater than 0"));
    }

    Ok(())
}

fn require_dir(what: &str, path: &Path) -> ConfigResult<()> {
    if !path.is_dir() {
        return Err(ConfigError::missing_path(what, path));
    }
    Ok(())
}
