//! Error and warning types produced while decoding a section file.

use std::error;
use std::fmt::{self, Display};
use std::result;

/// A fatal violation of the container format.
///
/// Carries the byte offset at which the violation was detected, when one is
/// meaningful (some checks, like "exactly one manifest root", span an entire
/// file node list and have no single offset).
#[derive(Debug)]
pub struct FormatError {
    message: String,
    offset: Option<usize>,
}

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    pub fn at(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
        }
    }

    pub fn truncated(needed: usize, offset: usize) -> Self {
        Self::at(format!("truncated: needed {needed} more bytes"), offset)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} (at offset 0x{offset:X})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl error::Error for FormatError {}

/// Result alias used throughout the decoder.
pub type Result<T> = result::Result<T, FormatError>;
