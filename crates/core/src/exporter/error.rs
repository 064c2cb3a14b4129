//! Error types for the exporter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned to the caller of an export.
///
/// Per-file and per-folder failures never show up here: they are logged and
/// reported as `Error` progress events while the export carries on.
#[derive(Debug, Error)]
pub enum ExportError {
    /// An export is already running on this exporter.
    #[error("An export is already in progress")]
    AlreadyRunning,

    /// The background export task panicked or was aborted.
    #[error("Export task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised while placing a single file at its destination.
#[derive(Debug, Error)]
pub enum CopyError {
    /// The task still waits for its conversion output.
    #[error("File is not ready to be copied: {path}")]
    NotReady { path: PathBuf },

    /// The file to copy vanished.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// The conversion stage left no output at the recorded path.
    #[error("Converted file not found: {path}")]
    ConvertedOutputMissing { path: PathBuf },

    /// A direct copy would overwrite an existing file.
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// Copy failed for another I/O reason.
    #[error("Failed to copy file from {from} to {to}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

impl CopyError {
    /// Creates a copy failed error.
    pub fn copy_failed(from: PathBuf, to: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed { from, to, error }
    }
}
