//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable [`Converter`](crate::converter::Converter)
//! and a recording progress listener, allowing export pipelines to be tested
//! without FFmpeg installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use musicmirror_core::testing::{fixtures, MockBehavior, MockConverter, RecordingListener};
//!
//! let converter = MockConverter::new();
//! let listener = RecordingListener::new();
//!
//! let dir = fixtures::library_folder(library.path(), "Art/Rec", &["song.flac"]);
//! converter.script(dir.join("song.flac"), [MockBehavior::Hang, MockBehavior::Succeed]).await;
//!
//! exporter.subscribe(listener.clone());
//! ```

mod mock_converter;
mod recording_listener;

pub use mock_converter::{MockBehavior, MockConverter};
pub use recording_listener::RecordingListener;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::library::{classify, FolderDescriptor};

    /// Creates `root/relative` holding `files`, each containing its own name.
    pub fn library_folder(root: &Path, relative: &str, files: &[&str]) -> PathBuf {
        let dir = root.join(relative);
        std::fs::create_dir_all(&dir).expect("create library folder");
        for file in files {
            std::fs::write(dir.join(file), file.as_bytes()).expect("write library file");
        }
        dir
    }

    /// Creates a library folder and classifies it.
    pub fn descriptor(root: &Path, relative: &str, files: &[&str]) -> FolderDescriptor {
        let dir = library_folder(root, relative, files);
        classify(root, &dir).expect("fixture folder follows the library layout")
    }
}
