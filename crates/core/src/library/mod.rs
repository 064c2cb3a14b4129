//! Library module: everything that describes the source side of an export.
//!
//! A music library is laid out as `Artist/Record[/[Format/]Volume]`. This
//! module turns such directories into [`FolderDescriptor`]s, discovers them
//! by walking a library root, and keeps the caller-owned selection list.
//!
//! # Example
//!
//! ```ignore
//! use musicmirror_core::library::{classify, scan_library, FolderCatalog};
//!
//! let folder = classify(Path::new("/music"), Path::new("/music/Artist/Record/FLAC"))?;
//! assert_eq!(folder.destination_name(), "Artist-Record");
//!
//! let scanned = scan_library(Path::new("/music"), &["flac".into(), "mp3".into()]).await?;
//! let mut catalog = FolderCatalog::load(Path::new("folders.json")).await?;
//! catalog.refresh(scanned);
//! catalog.select_all();
//! ```

mod catalog;
mod error;
mod folder;
mod scan;

pub use catalog::{FolderCatalog, RefreshReport, SelectableFolder};
pub use error::{CatalogError, ClassifyError, ScanError};
pub use folder::{classify, FolderDescriptor, FolderFormat};
pub use scan::{is_media_file, scan_library};
