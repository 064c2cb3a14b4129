//! Folder classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use super::error::ClassifyError;

/// Encoding a record folder is filed under (`Artist/Record/FLAC/...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FolderFormat {
    Mp3,
    Flac,
}

impl FolderFormat {
    /// Every known format token.
    pub const ALL: [FolderFormat; 2] = [FolderFormat::Mp3, FolderFormat::Flac];

    /// Returns the folder token for this format.
    pub fn token(&self) -> &'static str {
        match self {
            FolderFormat::Mp3 => "MP3",
            FolderFormat::Flac => "FLAC",
        }
    }

    /// Matches a folder name against the known tokens, ignoring case.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.token().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for FolderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A source directory broken down into artist, record, volume and format.
///
/// Built once per directory by [`classify`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDescriptor {
    path: PathBuf,
    artist: String,
    record: String,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    format: Option<FolderFormat>,
}

impl FolderDescriptor {
    /// Absolute path of the source directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn record(&self) -> &str {
        &self.record
    }

    /// Volume name, empty when the record has a single volume.
    pub fn volume(&self) -> &str {
        &self.volume
    }

    pub fn format(&self) -> Option<FolderFormat> {
        self.format
    }

    /// Name of the exported folder: `artist-record` or `artist-record-volume`.
    ///
    /// This is the key used to match source folders against the destination.
    pub fn destination_name(&self) -> String {
        if self.volume.is_empty() {
            format!("{}-{}", self.artist, self.record)
        } else {
            format!("{}-{}-{}", self.artist, self.record, self.volume)
        }
    }
}

/// Classifies `path` relative to the library `root`.
///
/// The relative part must follow `Artist/Record[/[Format/]Volume]`. The
/// format segment is matched case-insensitively against [`FolderFormat`].
pub fn classify(root: &Path, path: &Path) -> Result<FolderDescriptor, ClassifyError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ClassifyError::InvalidPath {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;

    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let (artist, record, rest) = match segments.as_slice() {
        [artist, record, rest @ ..] => (artist.clone(), record.clone(), rest),
        _ => {
            return Err(ClassifyError::UnrecognizedLayout {
                path: path.to_path_buf(),
            })
        }
    };

    let mut descriptor = FolderDescriptor {
        path: path.to_path_buf(),
        artist,
        record,
        volume: String::new(),
        format: None,
    };

    // Split what follows the record at its last separator.
    let (head, tail) = match rest {
        [] => return Ok(descriptor),
        [only] => (only.clone(), None),
        [head @ .., last] => (join_segments(head), Some(last.clone())),
    };

    match FolderFormat::from_token(&head) {
        Some(format) => {
            descriptor.format = Some(format);
            descriptor.volume = tail.unwrap_or_default();
        }
        None => {
            if tail.is_some() {
                return Err(ClassifyError::FormatAfterVolume {
                    path: path.to_path_buf(),
                });
            }
            descriptor.volume = head;
        }
    }

    Ok(descriptor)
}

fn join_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(std::path::MAIN_SEPARATOR_STR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/music")
    }

    fn check(path: &str, artist: &str, record: &str, volume: &str, format: Option<FolderFormat>) {
        let folder = classify(&root(), &root().join(path)).unwrap();
        assert_eq!(folder.artist(), artist);
        assert_eq!(folder.record(), record);
        assert_eq!(folder.volume(), volume);
        assert_eq!(folder.format(), format);
    }

    #[test]
    fn test_artist_record() {
        check("Artist/Record", "Artist", "Record", "", None);
    }

    #[test]
    fn test_format_only() {
        check("Artist/Record/FLAC", "Artist", "Record", "", Some(FolderFormat::Flac));
        check("Artist/Record/MP3", "Artist", "Record", "", Some(FolderFormat::Mp3));
    }

    #[test]
    fn test_format_token_ignores_case() {
        check("Artist/Record/flac", "Artist", "Record", "", Some(FolderFormat::Flac));
    }

    #[test]
    fn test_volume_only_with_trailing_separator() {
        check("Artist/Record/Volume1/", "Artist", "Record", "Volume1", None);
    }

    #[test]
    fn test_format_then_volume() {
        check(
            "Artist/Record/FLAC/Volume1",
            "Artist",
            "Record",
            "Volume1",
            Some(FolderFormat::Flac),
        );
    }

    #[test]
    fn test_volume_then_format_fails() {
        let err = classify(&root(), &root().join("Artist/Record/Volume1/FLAC")).unwrap_err();
        assert!(matches!(err, ClassifyError::FormatAfterVolume { .. }));
    }

    #[test]
    fn test_too_deep_after_format_fails() {
        let err = classify(&root(), &root().join("Artist/Record/FLAC/CD1/Extra")).unwrap_err();
        assert!(matches!(err, ClassifyError::FormatAfterVolume { .. }));
    }

    #[test]
    fn test_single_segment_fails() {
        let err = classify(&root(), &root().join("Artist")).unwrap_err();
        assert!(matches!(err, ClassifyError::UnrecognizedLayout { .. }));

        let err = classify(&root(), &root()).unwrap_err();
        assert!(matches!(err, ClassifyError::UnrecognizedLayout { .. }));
    }

    #[test]
    fn test_path_outside_root_fails() {
        let err = classify(&root(), Path::new("/elsewhere/Artist/Record")).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidPath { .. }));
        assert_eq!(err.path(), &PathBuf::from("/elsewhere/Artist/Record"));
    }

    #[test]
    fn test_destination_name() {
        let plain = classify(&root(), &root().join("Art/Rec/MP3")).unwrap();
        assert_eq!(plain.destination_name(), "Art-Rec");
        assert_eq!(plain.destination_name(), plain.destination_name());

        let volume = classify(&root(), &root().join("Art/Rec/FLAC/CD2")).unwrap();
        assert_eq!(volume.destination_name(), "Art-Rec-CD2");
    }

    #[test]
    fn test_descriptor_serialization() {
        let folder = classify(&root(), &root().join("Art/Rec/FLAC/CD2")).unwrap();
        let json = serde_json::to_string(&folder).unwrap();
        assert!(json.contains("\"FLAC\""));
        let parsed: FolderDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, folder);
    }
}
