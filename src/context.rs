//! Decode-wide context: strict mode, diagnostics, and the unknown-id dedup set.

use crate::error::{FormatError, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A recoverable issue surfaced while decoding.
#[derive(Debug, Clone)]
pub struct Warning {
    message: String,
    offset: Option<usize>,
}

impl Warning {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

/// Threaded through every layer of the pipeline. The sole source of interior
/// mutability in the decoder: an append-only warning list and a dedup set for
/// unknown file-node/JCID ids, so a given unknown id warns only once.
pub struct ParseContext {
    strict: bool,
    file_size: usize,
    path: Option<PathBuf>,
    warnings: RefCell<Vec<Warning>>,
    warned_ids: RefCell<HashSet<u32>>,
}

impl ParseContext {
    pub fn builder() -> ParseContextBuilder {
        ParseContextBuilder::new()
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn file_size(&self) -> usize {
        self.file_size
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a recoverable issue.
    pub fn warn(&self, message: impl Into<String>, offset: Option<usize>) {
        self.warnings.borrow_mut().push(Warning {
            message: message.into(),
            offset,
        });
    }

    /// Record a recoverable issue about an unknown id, once per id.
    pub fn warn_unknown_id(&self, id: u32, label: &str, offset: Option<usize>) {
        if self.warned_ids.borrow_mut().insert(id) {
            self.warn(format!("unknown {label} 0x{id:03X}"), offset);
        }
    }

    /// Enforce an invariant: a format error in strict mode, a warning otherwise.
    pub fn require(&self, condition: bool, message: impl Into<String>, offset: Option<usize>) -> Result<()> {
        if condition {
            return Ok(());
        }

        let message = message.into();
        if self.strict {
            Err(match offset {
                Some(offset) => FormatError::at(message, offset),
                None => FormatError::new(message),
            })
        } else {
            self.warn(message, offset);
            Ok(())
        }
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings.into_inner()
    }
}

/// Fluent builder for [`ParseContext`], mirroring the reader-construction
/// builders used elsewhere in this crate.
pub struct ParseContextBuilder {
    strict: bool,
    path: Option<PathBuf>,
}

impl ParseContextBuilder {
    pub fn new() -> Self {
        Self {
            strict: false,
            path: None,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn build(self, file_size: usize) -> ParseContext {
        ParseContext {
            strict: self.strict,
            file_size,
            path: self.path,
            warnings: RefCell::new(Vec::new()),
            warned_ids: RefCell::new(HashSet::new()),
        }
    }
}

impl Default for ParseContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
