//! Error types for the library module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while classifying a directory.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The path is not located under the library root.
    #[error("Path {path} is not under library root {root}")]
    InvalidPath { path: PathBuf, root: PathBuf },

    /// The relative path has no artist/record pair.
    #[error("Path {path} is not a recognized music folder")]
    UnrecognizedLayout { path: PathBuf },

    /// A segment follows the volume; the format must come before it.
    #[error("Path {path} is not a recognized music folder: the volume must come after the format")]
    FormatAfterVolume { path: PathBuf },
}

/// Errors raised while walking a library root.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The library root does not exist or is not a directory.
    #[error("Library root not found: {path}")]
    RootNotFound { path: PathBuf },

    /// A directory could not be read.
    #[error("Failed to read directory {path}")]
    ReadDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or saving a folder catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// I/O error reading or writing the catalog file.
    #[error("I/O error on catalog {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid JSON.
    #[error("Failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ClassifyError {
    /// The path that failed to classify.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::InvalidPath { path, .. }
            | Self::UnrecognizedLayout { path }
            | Self::FormatAfterVolume { path } => path,
        }
    }
}
