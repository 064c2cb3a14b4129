//! The unit of work of an export: one media file.

use std::path::{Path, PathBuf};
use tracing::warn;

/// One file's journey from the library to the destination tree.
///
/// Tasks are moved between stages by value: the orchestrator creates them,
/// at most one conversion worker sets the converted path, and the copy
/// consumer marks them done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTask {
    source_path: PathBuf,
    destination_path: PathBuf,
    converted_path: Option<PathBuf>,
    conversion_failed: bool,
    done: bool,
}

impl ExportTask {
    pub fn new(source_path: impl Into<PathBuf>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            converted_path: None,
            conversion_failed: false,
            done: false,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    /// Intermediate file produced by the conversion stage, if any.
    pub fn converted_path(&self) -> Option<&Path> {
        self.converted_path.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// True when every conversion attempt failed and the failure was reported.
    pub fn conversion_failed(&self) -> bool {
        self.conversion_failed
    }

    /// True when source and destination extensions differ, ignoring case.
    pub fn needs_conversion(&self) -> bool {
        lowercase_extension(&self.source_path) != lowercase_extension(&self.destination_path)
    }

    /// True when the copy stage may place this task.
    pub fn ready_to_copy(&self) -> bool {
        !self.done && (!self.needs_conversion() || self.converted_path.is_some())
    }

    /// Records the converted file. Only the first call has an effect.
    pub(crate) fn set_converted_path(&mut self, path: PathBuf) -> bool {
        if let Some(existing) = &self.converted_path {
            warn!(
                source = %self.source_path.display(),
                existing = %existing.display(),
                "Converted path already set, ignoring"
            );
            return false;
        }
        self.converted_path = Some(path);
        true
    }

    pub(crate) fn mark_conversion_failed(&mut self) {
        self.conversion_failed = true;
    }

    pub(crate) fn mark_done(&mut self) {
        self.done = true;
    }
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// File name a source file gets in the destination folder.
///
/// Files already in the target encoding keep their name; others get the
/// target extension.
pub fn destination_file_name(source: &Path, target_extension: &str) -> Option<PathBuf> {
    let file_name = source.file_name()?;
    let keeps_name = source
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(target_extension));

    if keeps_name {
        Some(PathBuf::from(file_name))
    } else {
        let mut name = source.file_stem().unwrap_or(file_name).to_os_string();
        name.push(".");
        name.push(target_extension);
        Some(PathBuf::from(name))
    }
}
