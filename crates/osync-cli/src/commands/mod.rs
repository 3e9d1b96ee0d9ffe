//! Subcommand implementations

pub mod completions;
pub mod config;
pub mod info;
pub mod serve;
pub mod sync;

use std::path::PathBuf;

use anyhow::{bail, Result};
use osync_core::{
    config::Config,
    domain::LibraryMode,
    ports::{LibraryLocator, SystemLibraryLocator},
};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// State shared by every subcommand
#[derive(Debug)]
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn formatter(&self) -> Box<dyn OutputFormatter + Send + Sync> {
        get_formatter(self.format, self.quiet)
    }
}

/// Picks the library root: explicit flag, then the configured root (when it
/// belongs to `mode`), then the platform default.
pub fn resolve_root(
    explicit: Option<PathBuf>,
    config: &Config,
    mode: LibraryMode,
    locator: &dyn LibraryLocator,
) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    if config.library.mode == mode {
        if let Some(root) = &config.library.root {
            return Ok(root.clone());
        }
    }
    match locator.default_root(mode) {
        Some(root) => Ok(root),
        None => bail!("No default {mode} library folder on this platform; pass --root"),
    }
}

/// [`resolve_root`] against the real platform folders
pub fn resolve_root_for_system(
    explicit: Option<PathBuf>,
    config: &Config,
    mode: LibraryMode,
) -> Result<PathBuf> {
    resolve_root(explicit, config, mode, &SystemLibraryLocator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct FixedLocator(Option<PathBuf>);

    impl LibraryLocator for FixedLocator {
        fn default_root(&self, _mode: LibraryMode) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    fn config_with_root(mode: LibraryMode, root: &str) -> Config {
        let mut config = Config::default();
        config.library.mode = mode;
        config.library.root = Some(PathBuf::from(root));
        config
    }

    #[test]
    fn test_explicit_root_wins() {
        let config = config_with_root(LibraryMode::Lazer, "/configured");
        let root = resolve_root(
            Some(PathBuf::from("/explicit")),
            &config,
            LibraryMode::Lazer,
            &FixedLocator(Some(PathBuf::from("/detected"))),
        )
        .unwrap();
        assert_eq!(root, Path::new("/explicit"));
    }

    #[test]
    fn test_configured_root_only_for_its_mode() {
        let config = config_with_root(LibraryMode::Lazer, "/configured");
        let locator = FixedLocator(Some(PathBuf::from("/detected")));

        let lazer = resolve_root(None, &config, LibraryMode::Lazer, &locator).unwrap();
        assert_eq!(lazer, Path::new("/configured"));

        let stable = resolve_root(None, &config, LibraryMode::Stable, &locator).unwrap();
        assert_eq!(stable, Path::new("/detected"));
    }

    #[test]
    fn test_no_root_anywhere_is_an_error() {
        let result = resolve_root(None, &Config::default(), LibraryMode::Stable, &FixedLocator(None));
        assert!(result.is_err());
    }
}
