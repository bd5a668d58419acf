//! # sourcetrace-config
//!
//! Configuration for source-trace correlation.
//!
//! Values are layered, lowest priority first: built-in defaults, a `sourcetrace.toml` file
//! in the selected root directory, and `SOURCETRACE_*` environment variables.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

use figment::{
    Figment, Provider,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::ExtractConfigError;

mod resolve;
pub use resolve::PathStrategy;

// reexport so the cli can merge flag overrides into the figment
pub use figment;

/// The name of the configuration file looked up in the root directory.
pub const CONFIG_FILE_NAME: &str = "sourcetrace.toml";

/// The prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "SOURCETRACE_";

/// Settings that steer the degraded paths of the correlation pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The strategies used, in order, to match a compiler-reported source path against the
    /// locally held file keys.
    pub path_resolution: Vec<PathStrategy>,
    /// Whether steps outside every known function range fall back to the function whose line
    /// span is closest.
    pub nearest_line_fallback: bool,
    /// How many lines a function's span is widened by on both sides when looking for the
    /// nearest function.
    pub nearest_line_padding: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path_resolution: PathStrategy::ALL.to_vec(),
            nearest_line_fallback: true,
            nearest_line_padding: 1,
        }
    }
}

impl Config {
    /// Loads the config from the current working directory.
    ///
    /// See [`figment_with_root`](Self::figment_with_root) for more details.
    pub fn load() -> Result<Self, ExtractConfigError> {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_from(root)
    }

    /// Loads the config with the given `root` directory.
    pub fn load_from(root: impl AsRef<Path>) -> Result<Self, ExtractConfigError> {
        Self::from_provider(Self::figment_with_root(root.as_ref()))
    }

    /// Extracts a `Config` from any figment [`Provider`].
    ///
    /// # Example
    ///
    /// ```
    /// use sourcetrace_config::{Config, figment::providers::Serialized};
    ///
    /// let figment = Config::figment_with_root(".".as_ref())
    ///     .merge(Serialized::default("nearest_line_fallback", false));
    /// let config = Config::from_provider(figment).unwrap();
    /// assert!(!config.nearest_line_fallback);
    /// ```
    pub fn from_provider<T: Provider>(provider: T) -> Result<Self, ExtractConfigError> {
        let figment = Figment::from(provider);
        let config = figment.extract::<Self>().map_err(ExtractConfigError::new)?;
        trace!(?config, "extracted config");
        Ok(config)
    }

    /// Returns the default figment for the given `root` directory.
    ///
    /// The figment merges, in order:
    /// - the built-in defaults
    /// - `<root>/sourcetrace.toml`, if it exists
    /// - `SOURCETRACE_` prefixed environment variables
    pub fn figment_with_root(root: &Path) -> Figment {
        let file = root.join(CONFIG_FILE_NAME);
        debug!(path = %file.display(), exists = file.exists(), "loading config file");
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// The padding used by the nearest-line fallback, or `None` if the fallback is disabled.
    pub fn fallback_padding(&self) -> Option<usize> {
        self.nearest_line_fallback.then_some(self.nearest_line_padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.fallback_padding(), Some(1));
    }

    #[test]
    fn reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
path_resolution = ["exact", "stem"]
nearest_line_fallback = false
nearest_line_padding = 3
"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.path_resolution, vec![PathStrategy::Exact, PathStrategy::Stem]);
        assert_eq!(config.nearest_line_padding, 3);
        assert_eq!(config.fallback_padding(), None);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "nearest_line_padding = 2\n").unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.path_resolution, PathStrategy::ALL.to_vec());
        assert_eq!(config.fallback_padding(), Some(2));
    }

    #[test]
    fn reports_bad_setting() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "path_resolution = [\"fuzzy\"]\n").unwrap();

        let err = Config::load_from(dir.path()).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.starts_with(error::FAILED_TO_EXTRACT_CONFIG_MSG), "{rendered}");
        assert!(rendered.contains("fuzzy"), "{rendered}");
        assert!(rendered.contains("valid strategies: exact, basename, stem, prefix"), "{rendered}");
        assert_eq!(err.settings(), vec!["path_resolution".to_string()]);
    }

    #[test]
    fn other_settings_skip_strategy_list() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "nearest_line_padding = \"wide\"\n").unwrap();

        let err = Config::load_from(dir.path()).unwrap_err();
        let rendered = err.to_string();
        assert!(!rendered.contains("valid strategies"), "{rendered}");
        assert_eq!(err.settings(), vec!["nearest_line_padding".to_string()]);
    }
}
