// src/error.rs

//! Error types shared across the crate.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the library.
///
/// Manifest errors abort only the system being imported; the
/// multi-system driver catches them and moves on. `InvalidDatabase`
/// is terminal and maps to exit code 1 at the CLI boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The file at the database path is missing tables or columns of
    /// the romdb schema, or cannot be opened at all.
    #[error("invalid romdb database")]
    InvalidDatabase,

    /// A required manifest file is absent (or is a directory).
    #[error("missing manifest: {path}")]
    MissingManifest { path: PathBuf },

    /// A manifest exists but holds fewer lines than its format needs.
    #[error("manifest too short: {path}")]
    ShortManifest { path: PathBuf },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the manifest errors that abort a single system import
    /// without failing the whole run.
    pub fn is_system_abort(&self) -> bool {
        matches!(
            self,
            Error::MissingManifest { .. } | Error::ShortManifest { .. }
        )
    }
}
