// SPDX-License-Identifier: MIT
//
// Error types for the terminal layer.
//
// Only conditions a caller can act on become errors. Missing capabilities
// are not errors at all: they fall back to synthesized sequences or skip
// the cosmetic behavior, and leave a `debug` trace behind.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the terminal layer.
#[derive(Debug, Error)]
pub enum TermError {
    /// No compiled terminfo entry and no built-in description exists for
    /// the terminal type. Nothing can be drawn correctly without one.
    #[error("terminal type '{name}' not found in the terminfo database")]
    UnknownTerminal { name: String },

    /// A compiled terminfo file exists but could not be decoded.
    #[error("malformed terminfo entry {path}: {reason}")]
    BadTerminfo { path: PathBuf, reason: &'static str },

    /// A cell buffer could not be allocated. The previous buffers of the
    /// area are left untouched.
    #[error("cannot allocate a buffer of {cells} cells")]
    Allocation { cells: usize },

    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Returned by print operations once the cursor has moved past the last
/// row of an area. The character that caused it, if any, was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("print cursor moved past the end of the area")]
pub struct EndOfArea;

pub type Result<T> = std::result::Result<T, TermError>;
