//! Library discovery.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use super::error::ScanError;
use super::folder::{classify, FolderDescriptor};

/// Whether `path` has one of the given extensions (without dot, any case).
pub fn is_media_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}

/// Walks `root` and classifies every directory that directly holds media files.
///
/// Directories that hold media but do not follow the library layout are
/// logged and skipped. Unreadable subdirectories are skipped as well; only a
/// missing or unreadable root is an error. Results are ordered by path.
pub async fn scan_library(
    root: &Path,
    extensions: &[String],
) -> Result<Vec<FolderDescriptor>, ScanError> {
    if !fs::metadata(root).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(ScanError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut folders = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let (files, subdirs) = match list_dir(&dir).await {
            Ok(listing) => listing,
            Err(e) if dir.as_path() == root => return Err(e),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };

        if files.iter().any(|f| is_media_file(f, extensions)) {
            match classify(root, &dir) {
                Ok(folder) => folders.push(folder),
                Err(e) => warn!(error = %e, "Skipping unclassifiable folder"),
            }
        }

        pending.extend(subdirs);
    }

    folders.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(folders)
}

async fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ScanError> {
    let read_failed = |source| ScanError::ReadDirFailed {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir).await.map_err(read_failed)?;
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
        let file_type = entry.file_type().await.map_err(read_failed)?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }

    Ok((files, subdirs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["flac".to_string(), "mp3".to_string()]
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"audio").unwrap();
    }

    #[test]
    fn test_is_media_file() {
        let exts = extensions();
        assert!(is_media_file(Path::new("/a/song.flac"), &exts));
        assert!(is_media_file(Path::new("/a/song.MP3"), &exts));
        assert!(!is_media_file(Path::new("/a/cover.jpg"), &exts));
        assert!(!is_media_file(Path::new("/a/README"), &exts));
    }

    #[tokio::test]
    async fn test_scan_finds_classified_folders() {
        let library = TempDir::new().unwrap();
        touch(library.path(), "Art/Rec/FLAC/01.flac");
        touch(library.path(), "Art/Rec/MP3/01.mp3");
        touch(library.path(), "Other/Album/track.MP3");
        touch(library.path(), "Other/Album/cover.jpg");
        touch(library.path(), "Other/Empty/cover.jpg");
        // Loose file in an artist folder: media, but no record segment.
        touch(library.path(), "Loose/track.mp3");

        let folders = scan_library(library.path(), &extensions()).await.unwrap();
        let names: Vec<String> = folders.iter().map(|f| f.destination_name()).collect();

        assert_eq!(names, vec!["Art-Rec", "Art-Rec", "Other-Album"]);
        assert_eq!(folders[0].path(), library.path().join("Art/Rec/FLAC"));
    }

    #[tokio::test]
    async fn test_scan_missing_root() {
        let result = scan_library(Path::new("/nonexistent/library"), &extensions()).await;
        assert!(matches!(result, Err(ScanError::RootNotFound { .. })));
    }
}
