//! Configuration extraction errors.

use crate::PathStrategy;
use std::{error::Error, fmt};

/// The message prefixed to every rendered extraction failure.
pub const FAILED_TO_EXTRACT_CONFIG_MSG: &str = "failed to extract sourcetrace config:";

/// Represents a failed attempt to extract `Config` from a `Figment`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractConfigError {
    pub(crate) error: figment::Error,
}

impl ExtractConfigError {
    pub fn new(error: figment::Error) -> Self {
        Self { error }
    }

    /// The settings that failed to extract, e.g. `nearest_line_padding`.
    pub fn settings(&self) -> Vec<String> {
        let mut settings = Vec::new();
        for err in self.error.clone() {
            if let Some(key) = err.path.first()
                && !settings.contains(key)
            {
                settings.push(key.clone());
            }
        }
        settings
    }
}

impl fmt::Display for ExtractConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{FAILED_TO_EXTRACT_CONFIG_MSG}")?;
        let mut seen = Vec::with_capacity(self.error.count());
        for err in self.error.clone() {
            let line = setting_error(&err);
            if !seen.contains(&line) {
                writeln!(f, "{line}")?;
                seen.push(line);
            }
        }
        Ok(())
    }
}

impl Error for ExtractConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Error::source(&self.error)
    }
}

/// Renders one failure, listing the accepted values when a strategy name is unknown.
fn setting_error(err: &figment::Error) -> String {
    let mut line = err.to_string();
    if err.path.first().is_some_and(|key| key == "path_resolution") {
        let valid = PathStrategy::ALL.map(|strategy| strategy.as_str()).join(", ");
        line.push_str(&format!(" (valid strategies: {valid})"));
    }
    line
}
