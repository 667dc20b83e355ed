//! Compiler error taxonomy.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors raised by the compiler phases.
///
/// [`CompileError::Cancelled`] is not a failure: it reports that a phase
/// observed a stop request and unwound.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compiler error: {0}")]
    Generic(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),

    #[error("out of memory")]
    OutOfMemory(#[from] TryReserveError),

    #[error("invalid tree data: {0}")]
    InvalidTreeData(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("compilation cancelled")]
    Cancelled,

    #[error("level data i/o failed")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// True for the cooperative abort signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CompileError::Cancelled)
    }
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// Grows `vec` so it can take `additional` more elements, reporting
/// allocation failure instead of aborting.
pub(crate) fn reserve<T>(vec: &mut Vec<T>, additional: usize) -> Result<()> {
    vec.try_reserve(additional)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_distinguished() {
        assert!(CompileError::Cancelled.is_cancelled());
        assert!(!CompileError::InvalidParameters("no faces").is_cancelled());
    }

    #[test]
    fn reserve_reports_capacity_overflow() {
        let mut huge: Vec<u64> = Vec::new();
        let err = reserve(&mut huge, usize::MAX).unwrap_err();
        assert!(matches!(err, CompileError::OutOfMemory(_)));
    }
}
