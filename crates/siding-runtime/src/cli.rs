//! Command line options understood during initialization.
//!
//! The host application owns the command line, so parsing keeps only the
//! options below and ignores everything else.

use std::path::PathBuf;

use clap::{CommandFactory, Parser};

use crate::config::SidingConfig;

/// Initialization options.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "siding", disable_help_flag = true)]
pub struct InitArgs {
    /// Do not activate plugins or the saved style.
    #[arg(long)]
    pub safe_mode: bool,

    /// Additional plugin search path. May be repeated.
    #[arg(long = "plugin-path", value_name = "PATH")]
    pub plugin_paths: Vec<PathBuf>,

    /// Style to activate instead of the saved one.
    #[arg(long)]
    pub style: Option<String>,

    /// Profile name.
    #[arg(long)]
    pub profile: Option<String>,

    /// Explicit profile directory.
    #[arg(long, value_name = "PATH")]
    pub profile_path: Option<PathBuf>,

    /// Application root directory.
    #[arg(long, value_name = "PATH")]
    pub root_path: Option<PathBuf>,

    /// Additional resource source. May be repeated.
    #[arg(long = "source", value_name = "PATH")]
    pub sources: Vec<PathBuf>,

    /// Keep the profile below the application root.
    #[arg(long)]
    pub portable: bool,
}

impl InitArgs {
    /// Parses the known options out of `args` (without the program name),
    /// skipping any argument that is not one of them.
    pub fn parse_known<I, S>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = Self::command();
        let known: Vec<(String, bool)> = command
            .get_arguments()
            .filter_map(|arg| {
                arg.get_long()
                    .map(|long| (format!("--{long}"), arg.get_action().takes_values()))
            })
            .collect();

        let mut kept = vec!["siding".to_string()];
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            let flag = arg.split_once('=').map_or(arg.as_str(), |(flag, _)| flag);
            let Some((_, takes_value)) = known.iter().find(|(long, _)| long == flag) else {
                continue;
            };
            let inline_value = arg.contains('=');
            kept.push(arg);
            if *takes_value && !inline_value {
                if let Some(value) = args.next() {
                    kept.push(value);
                }
            }
        }

        Self::try_parse_from(kept)
    }

    /// Parses the known options out of the process arguments.
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::parse_known(std::env::args().skip(1))
    }

    /// Overrides configuration values with the options that were given.
    pub fn apply(&self, config: &mut SidingConfig) {
        if self.safe_mode {
            config.addons.safe_mode = true;
        }

        let mut plugin_paths = self.plugin_paths.clone();
        plugin_paths.extend(config.addons.plugin_paths.drain(..));
        config.addons.plugin_paths = plugin_paths;

        if let Some(style) = &self.style {
            config.style.style = Some(style.clone());
        }
        if let Some(profile) = &self.profile {
            config.profile.name = profile.clone();
        }
        if let Some(path) = &self.profile_path {
            config.profile.path = Some(path.clone());
        }
        if let Some(root) = &self.root_path {
            config.application.root_path = Some(root.clone());
        }
        for source in &self.sources {
            if !config.application.sources.contains(source) {
                config.application.sources.push(source.clone());
            }
        }
        if self.portable {
            config.profile.portable = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_known_skips_host_arguments() {
        let args = InitArgs::parse_known([
            "--fullscreen",
            "--plugin-path",
            "extra",
            "-v",
            "--style=Dark",
            "document.txt",
            "--plugin-path=more",
            "--safe-mode",
            "--geometry",
            "--source",
            "share",
        ])
        .unwrap();

        assert_eq!(
            args,
            InitArgs {
                safe_mode: true,
                plugin_paths: vec!["extra".into(), "more".into()],
                style: Some("Dark".to_string()),
                sources: vec!["share".into()],
                ..InitArgs::default()
            }
        );
    }

    #[test]
    fn test_parse_known_empty() {
        let args = InitArgs::parse_known(Vec::<String>::new()).unwrap();
        assert_eq!(args, InitArgs::default());
    }

    #[test]
    fn test_apply_overrides_config() {
        let mut config = SidingConfig::default();
        config.addons.plugin_paths.push("configured".into());
        config.application.sources.push("share".into());

        let args = InitArgs::parse_known([
            "--profile",
            "work",
            "--portable",
            "--plugin-path",
            "cli",
            "--source",
            "share",
            "--root-path",
            "/opt/app",
        ])
        .unwrap();
        args.apply(&mut config);

        assert_eq!(config.profile.name, "work");
        assert!(config.profile.portable);
        assert!(!config.addons.safe_mode);
        assert_eq!(
            config.addons.plugin_paths,
            vec![PathBuf::from("cli"), PathBuf::from("configured")]
        );
        assert_eq!(config.application.sources, vec![PathBuf::from("share")]);
        assert_eq!(config.application.root_path, Some(PathBuf::from("/opt/app")));
    }
}
