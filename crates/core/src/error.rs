//! Errors raised at the input boundaries of the pipeline.
//!
//! Everything past hex decoding degrades instead of failing, so this module stays small.

use alloy_primitives::hex::FromHexError;

/// Bytecode that arrived as a hex string and could not be decoded into bytes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MalformedBytecode {
    #[error("bytecode has an odd number of hex digits ({0})")]
    OddLength(usize),
    #[error("invalid hex character {c:?} at position {index}")]
    InvalidHexCharacter { c: char, index: usize },
    #[error("bytecode of {0} hex digits does not fit the target buffer")]
    InvalidLength(usize),
}

impl MalformedBytecode {
    /// Converts a hex decoding error for a string of `len` digits.
    pub(crate) fn from_hex_error(err: FromHexError, len: usize) -> Self {
        match err {
            FromHexError::InvalidHexCharacter { c, index } => {
                Self::InvalidHexCharacter { c, index }
            }
            FromHexError::OddLength => Self::OddLength(len),
            FromHexError::InvalidStringLength => Self::InvalidLength(len),
        }
    }
}

/// A source-map jump marker that is none of `i`, `o`, `-` or their spelled-out forms.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown jump type {0:?}")]
pub struct UnknownJumpType(pub String);
