use serde::{Deserialize, Serialize};
use std::fmt;

/// A way of matching a path reported by the compiler against a locally held file key.
///
/// Compilers report paths relative to their own project root, which rarely equals the key the
/// editor stores a file under, so matching is attempted with progressively looser strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStrategy {
    /// The normalized paths are equal.
    Exact,
    /// The final path components are equal, e.g. `src/Token.sol` and `Token.sol`.
    Basename,
    /// The final path components without extension are equal, e.g. `Token.sol` and `Token`.
    Stem,
    /// One stem starts with the other.
    Prefix,
}

impl PathStrategy {
    /// All strategies, from strictest to loosest.
    pub const ALL: [Self; 4] = [Self::Exact, Self::Basename, Self::Stem, Self::Prefix];

    /// Returns the name used in configuration files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Basename => "basename",
            Self::Stem => "stem",
            Self::Prefix => "prefix",
        }
    }
}

impl fmt::Display for PathStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
