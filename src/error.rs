//! Analysis error kinds.
//!
//! Per-file problems are logged and recovered from inside the phases; only
//! the kinds here abort a run. No artifact is written on any of them.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("repository path does not exist or is not a directory: {0}")]
    InvalidRoot(PathBuf),

    #[error("cannot read repository root {path}: {source}")]
    RootIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = AnalysisError::InvalidRoot(PathBuf::from("/no/such/dir"));
        assert!(err.to_string().contains("/no/such/dir"));

        let err = AnalysisError::InvariantViolation("call edge references sym_9999".into());
        assert!(err.to_string().contains("sym_9999"));
    }
}
