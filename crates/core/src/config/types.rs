use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::converter::ConverterConfig;
use crate::exporter::ExportConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub export: ExportConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl Config {
    /// Configuration with defaults everywhere but the two required paths.
    pub fn new(root: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            library: LibraryConfig {
                root: root.into(),
                catalog_path: default_catalog_path(),
            },
            export: ExportConfig::new(destination),
            converter: ConverterConfig::default(),
        }
    }
}

/// Source library configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Directory laid out as `Artist/Record[/[Format/]Volume]`.
    pub root: PathBuf,
    /// JSON file holding the scanned folders and their selection.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("musicmirror-folders.json")
}
