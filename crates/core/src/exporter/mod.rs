//! Exporter module: mirrors selected library folders into a destination tree.
//!
//! An export runs as a two-stage pipeline on a background task:
//!
//! - **Conversion**: files whose extension differs from the target are
//!   transcoded by a pool of workers, each attempt bounded by a timeout and
//!   retried up to a configured count
//! - **Copy**: a single consumer places direct copies and converted files at
//!   the destination, deleting intermediates as it goes
//!
//! The two stages share an unbounded queue. The pool owns the only sender
//! while conversions run, so the consumer stops exactly when the last
//! converted file has been handed over.
//!
//! Every transition is reported to registered [`ProgressListener`]s as an
//! [`ExportProgressEvent`]. Failures of a single file or folder become
//! `Error` events and never abort the export; a `Completed` event always
//! closes it.
//!
//! # Example
//!
//! ```ignore
//! use musicmirror_core::converter::FfmpegConverter;
//! use musicmirror_core::exporter::{ExportConfig, Exporter};
//!
//! let exporter = Exporter::new(ExportConfig::new("/mnt/player"), FfmpegConverter::with_defaults());
//! exporter.subscribe(|event: &ExportProgressEvent| println!("{}: {}", event.stage, event.message));
//!
//! let summary = exporter.run(catalog.selected()).await?;
//! println!("Copied {} files", summary.copied);
//! ```

mod config;
mod consumer;
mod error;
mod events;
mod orchestrator;
mod pool;
mod progress;
mod task;

pub use config::ExportConfig;
pub use error::{CopyError, ExportError};
pub use events::{
    ChannelListener, ExportProgressEvent, ExportStage, ListenerRegistry, ProgressListener,
};
pub use orchestrator::{CancelFlag, ExportHandle, Exporter};
pub use pool::PoolSettings;
pub use progress::{ExportCounters, ExportSummary};
pub use task::{destination_file_name, ExportTask};
