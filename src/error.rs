use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a setup run. All variants are fatal.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{what} not found: {}", path.display())]
    MissingPath { what: &'static str, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {} at line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: missing field {field}", path.display())]
    MissingField { path: PathBuf, field: String },

    #[error("{}: cannot edit {field}: {reason}", path.display())]
    UnsupportedLayout {
        path: PathBuf,
        field: String,
        reason: String,
    },

    #[error("{}: {field} reads back as {found:?} after patching, expected {expected:?}", path.display())]
    Verify {
        path: PathBuf,
        field: String,
        expected: String,
        found: String,
    },

    #[error("{failed} of {total} script copies failed")]
    Copy { failed: usize, total: usize },

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] globset::Error),
}
