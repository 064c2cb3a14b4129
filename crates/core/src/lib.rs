pub mod config;
pub mod converter;
pub mod exporter;
pub mod library;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LibraryConfig,
};
pub use converter::{Converter, ConverterConfig, ConverterError, FfmpegConverter, TargetFormat};
pub use exporter::{
    ExportConfig, ExportError, ExportHandle, ExportProgressEvent, ExportStage, ExportSummary,
    Exporter, ProgressListener,
};
pub use library::{classify, scan_library, FolderCatalog, FolderDescriptor, FolderFormat};
