// SPDX-License-Identifier: MIT
//
// Error type of the compositor.
//
// Area handles are plain indices, so a stale or foreign handle is an
// ordinary error rather than a panic. Everything from the terminal layer
// passes through unchanged.

use std::io;

use stratum_term::{EndOfArea, TermError};
use thiserror::Error;

use crate::compositor::AreaId;

/// Failures of compositor operations.
#[derive(Debug, Error)]
pub enum AreaError {
    /// The handle does not name a live area.
    #[error("no area with handle {0}")]
    UnknownArea(AreaId),

    /// The desktop lives as long as the compositor and always sits below
    /// every window.
    #[error("operation not allowed on the desktop area")]
    Desktop,

    /// A print ran past the last row of its area.
    #[error(transparent)]
    EndOfArea(#[from] EndOfArea),

    #[error(transparent)]
    Term(#[from] TermError),

    #[error("terminal output failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, AreaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_area_is_transparent() {
        let err: AreaError = EndOfArea.into();
        assert_eq!(err.to_string(), EndOfArea.to_string());
        assert!(matches!(err, AreaError::EndOfArea(_)));
    }

    #[test]
    fn allocation_failures_pass_through() {
        let err: AreaError = TermError::Allocation { cells: 12 }.into();
        assert_eq!(err.to_string(), "cannot allocate a buffer of 12 cells");
    }
}
