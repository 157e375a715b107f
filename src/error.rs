//! Error types surfaced by the theme packager.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Failures that abort a packaging run.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The theme root is missing, not a directory, or has no usable base name.
    #[error("invalid theme root {}: {reason}", .path.display())]
    InvalidRoot {
        /// Root path as supplied by the caller.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    /// Reading, renaming or walking the theme directory failed.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path that caused the error.
        path: PathBuf,
        /// Source I/O error.
        #[source]
        source: io::Error,
    },

    /// The manifest is not valid JSON or has an unexpected shape.
    #[error("invalid manifest {}: {reason}", .path.display())]
    ManifestParse {
        /// Manifest path.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// The compressed archive stream rejected data.
    #[error("failed to write archive: {source}")]
    ArchiveWrite {
        /// Source I/O error.
        #[source]
        source: io::Error,
    },
}

/// Coarse category of a [`BundleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleErrorKind {
    /// See [`BundleError::InvalidRoot`].
    InvalidRoot,
    /// See [`BundleError::Filesystem`].
    Filesystem,
    /// See [`BundleError::ManifestParse`].
    ManifestParse,
    /// See [`BundleError::ArchiveWrite`].
    ArchiveWrite,
}

impl BundleError {
    /// Category of this error.
    pub fn kind(&self) -> BundleErrorKind {
        match self {
            Self::InvalidRoot { .. } => BundleErrorKind::InvalidRoot,
            Self::Filesystem { .. } => BundleErrorKind::Filesystem,
            Self::ManifestParse { .. } => BundleErrorKind::ManifestParse,
            Self::ArchiveWrite { .. } => BundleErrorKind::ArchiveWrite,
        }
    }

    pub(crate) fn filesystem(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn manifest(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn archive(source: io::Error) -> Self {
        Self::ArchiveWrite { source }
    }
}
