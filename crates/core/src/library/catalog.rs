//! Caller-owned list of folders with their selection state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use super::error::CatalogError;
use super::folder::FolderDescriptor;

/// A folder together with the caller's selection flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectableFolder {
    #[serde(flatten)]
    pub folder: FolderDescriptor,
    #[serde(default)]
    pub selected: bool,
}

/// Outcome of merging a fresh scan into a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub added: usize,
    pub removed: usize,
}

/// The list of known library folders, persisted as JSON between runs.
#[derive(Debug, Clone, Default)]
pub struct FolderCatalog {
    folders: Vec<SelectableFolder>,
}

impl FolderCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding `folders`, all unselected.
    pub fn from_folders(folders: Vec<FolderDescriptor>) -> Self {
        let mut catalog = Self {
            folders: folders
                .into_iter()
                .map(|folder| SelectableFolder {
                    folder,
                    selected: false,
                })
                .collect(),
        };
        catalog.sort();
        catalog
    }

    pub fn folders(&self) -> &[SelectableFolder] {
        &self.folders
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Merges a fresh scan: folders whose path vanished are dropped, new
    /// paths are added unselected, survivors keep their selection.
    pub fn refresh(&mut self, scanned: Vec<FolderDescriptor>) -> RefreshReport {
        let scanned_paths: HashSet<PathBuf> =
            scanned.iter().map(|f| f.path().to_path_buf()).collect();
        let before = self.folders.len();
        self.folders
            .retain(|entry| scanned_paths.contains(entry.folder.path()));
        let removed = before - self.folders.len();

        let known: HashSet<PathBuf> = self
            .folders
            .iter()
            .map(|entry| entry.folder.path().to_path_buf())
            .collect();
        let mut added = 0;
        for folder in scanned {
            if !known.contains(folder.path()) {
                self.folders.push(SelectableFolder {
                    folder,
                    selected: false,
                });
                added += 1;
            }
        }

        self.sort();
        RefreshReport { added, removed }
    }

    pub fn select_all(&mut self) {
        for entry in &mut self.folders {
            entry.selected = true;
        }
    }

    pub fn clear_selection(&mut self) {
        for entry in &mut self.folders {
            entry.selected = false;
        }
    }

    /// Sets the selection of every folder exporting to `destination_name`.
    ///
    /// Returns the number of folders that matched.
    pub fn set_selected(&mut self, destination_name: &str, selected: bool) -> usize {
        let mut matched = 0;
        for entry in &mut self.folders {
            if entry.folder.destination_name() == destination_name {
                entry.selected = selected;
                matched += 1;
            }
        }
        matched
    }

    /// The selected folders, in catalog order.
    pub fn selected(&self) -> Vec<FolderDescriptor> {
        self.folders
            .iter()
            .filter(|entry| entry.selected)
            .map(|entry| entry.folder.clone())
            .collect()
    }

    /// Loads a catalog from `path`; a missing file yields an empty catalog.
    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let folders: Vec<SelectableFolder> =
            serde_json::from_slice(&data).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut catalog = Self { folders };
        catalog.sort();
        Ok(catalog)
    }

    /// Writes the catalog to `path` as pretty-printed JSON.
    pub async fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let json = serde_json::to_vec_pretty(&self.folders).map_err(|source| {
            CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tokio::fs::write(path, json)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), folders = self.folders.len(), "Saved folder catalog");
        Ok(())
    }

    fn sort(&mut self) {
        self.folders.sort_by(|a, b| {
            (a.folder.artist(), a.folder.record(), a.folder.path())
                .cmp(&(b.folder.artist(), b.folder.record(), b.folder.path()))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::classify;
    use tempfile::TempDir;

    fn folder(relative: &str) -> FolderDescriptor {
        classify(Path::new("/music"), &Path::new("/music").join(relative)).unwrap()
    }

    #[test]
    fn test_from_folders_sorted_by_artist_then_record() {
        let catalog = FolderCatalog::from_folders(vec![
            folder("Zappa/Hot Rats"),
            folder("Air/Moon Safari"),
            folder("Air/Talkie Walkie"),
        ]);
        let names: Vec<String> = catalog
            .folders()
            .iter()
            .map(|e| e.folder.destination_name())
            .collect();
        assert_eq!(
            names,
            vec!["Air-Moon Safari", "Air-Talkie Walkie", "Zappa-Hot Rats"]
        );
        assert!(catalog.selected().is_empty());
    }

    #[test]
    fn test_refresh_keeps_selection_of_survivors() {
        let mut catalog = FolderCatalog::from_folders(vec![folder("A/One"), folder("B/Two")]);
        assert_eq!(catalog.set_selected("A-One", true), 1);
        assert_eq!(catalog.set_selected("B-Two", true), 1);

        let report = catalog.refresh(vec![folder("A/One"), folder("C/Three")]);

        assert_eq!(report, RefreshReport { added: 1, removed: 1 });
        assert_eq!(catalog.len(), 2);
        let selected: Vec<String> = catalog
            .selected()
            .iter()
            .map(|f| f.destination_name())
            .collect();
        assert_eq!(selected, vec!["A-One"]);
    }

    #[test]
    fn test_set_selected_matches_every_format_folder() {
        let mut catalog =
            FolderCatalog::from_folders(vec![folder("A/One/FLAC"), folder("A/One/MP3")]);
        assert_eq!(catalog.set_selected("A-One", true), 2);
        assert_eq!(catalog.set_selected("Nope", true), 0);
        catalog.clear_selection();
        assert!(catalog.selected().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("folders.json");

        let mut catalog = FolderCatalog::from_folders(vec![folder("A/One/FLAC/CD1")]);
        catalog.select_all();
        catalog.save(&path).await.unwrap();

        let loaded = FolderCatalog::load(&path).await.unwrap();
        assert_eq!(loaded.folders(), catalog.folders());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = FolderCatalog::load(&dir.path().join("missing.json"))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let result = FolderCatalog::load(&path).await;
        assert!(matches!(result, Err(CatalogError::Parse { .. })));
    }
}
