//! Export orchestrator.
//!
//! Drives one export at a time through its phases:
//! - **Housekeeping**: stale destination folders are deleted
//! - **Planning**: selected folders become export tasks
//! - **Conversion**: parallel, bounded by the pool settings
//! - **Copy**: sequential, a single consumer owns destination writes

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::converter::Converter;
use crate::library::{is_media_file, FolderDescriptor};

use super::config::ExportConfig;
use super::consumer::CopyConsumer;
use super::error::ExportError;
use super::events::{ChannelListener, ExportProgressEvent, ExportStage, ListenerRegistry, ProgressListener};
use super::pool::{ConversionWorkerPool, PoolSettings};
use super::progress::{ExportCounters, ExportSummary, ProgressReporter};
use super::task::{destination_file_name, ExportTask};

/// Cooperative cancellation shared by every stage of one export.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle on a running export.
#[derive(Debug)]
pub struct ExportHandle {
    join: JoinHandle<ExportSummary>,
    cancel: CancelFlag,
}

impl ExportHandle {
    /// Asks the export to stop.
    ///
    /// Conversions already running finish or time out and nothing new is
    /// started. Files already queued are still copied, then a `Completed`
    /// event closes the export.
    pub fn cancel(&self) {
        info!("Export cancellation requested");
        self.cancel.cancel();
    }

    /// The flag [`cancel`](Self::cancel) raises, for use after `wait` took the handle.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Waits for the export to finish.
    pub async fn wait(self) -> Result<ExportSummary, ExportError> {
        self.join
            .await
            .map_err(|e| ExportError::TaskFailed(e.to_string()))
    }
}

/// Clears the running flag when the export ends, panics included.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Mirrors selected library folders into the destination tree.
pub struct Exporter<C: Converter + 'static> {
    config: ExportConfig,
    converter: Arc<C>,
    listeners: Arc<ListenerRegistry>,
    counters: Arc<ExportCounters>,
    running: Arc<AtomicBool>,
}

impl<C: Converter + 'static> Exporter<C> {
    pub fn new(config: ExportConfig, converter: C) -> Self {
        Self::with_shared_converter(config, Arc::new(converter))
    }

    /// Creates an exporter around a converter that is also used elsewhere.
    pub fn with_shared_converter(config: ExportConfig, converter: Arc<C>) -> Self {
        Self {
            config,
            converter,
            listeners: Arc::new(ListenerRegistry::new()),
            counters: Arc::new(ExportCounters::default()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Registers a listener for every later event.
    pub fn subscribe(&self, listener: impl ProgressListener + 'static) {
        self.listeners.register(Arc::new(listener));
    }

    /// Registers a listener that forwards events into a channel.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<ExportProgressEvent> {
        let (listener, rx) = ChannelListener::new();
        self.subscribe(listener);
        rx
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Counters of the current or last export.
    pub fn progress(&self) -> ExportProgressEvent {
        self.counters.snapshot(ExportStage::Completed, "")
    }

    /// Zeroes the counters. Ignored while an export runs.
    pub fn reset(&self) {
        if self.is_running() {
            warn!("Cannot reset counters while an export is running");
            return;
        }
        self.counters.reset();
    }

    /// Starts exporting `folders` in the background.
    ///
    /// Fails with [`ExportError::AlreadyRunning`] while another export of
    /// this exporter is in flight.
    pub fn export(&self, folders: Vec<FolderDescriptor>) -> Result<ExportHandle, ExportError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Export requested while another one is running");
            return Err(ExportError::AlreadyRunning);
        }
        let guard = RunningGuard(Arc::clone(&self.running));
        let cancel = CancelFlag::default();

        let run = ExportRun {
            config: self.config.clone(),
            converter: Arc::clone(&self.converter),
            reporter: ProgressReporter::new(
                Arc::clone(&self.listeners),
                Arc::clone(&self.counters),
            ),
            cancel: cancel.clone(),
        };

        info!(
            folders = folders.len(),
            destination = %self.config.destination.display(),
            "Starting export"
        );
        let join = tokio::spawn(run.execute(folders, guard));

        Ok(ExportHandle { join, cancel })
    }

    /// Runs an export to completion.
    pub async fn run(&self, folders: Vec<FolderDescriptor>) -> Result<ExportSummary, ExportError> {
        self.export(folders)?.wait().await
    }
}

/// State of one export, moved onto the background task.
struct ExportRun<C: Converter + 'static> {
    config: ExportConfig,
    converter: Arc<C>,
    reporter: ProgressReporter,
    cancel: CancelFlag,
}

/// Output of the planning phase.
#[derive(Default)]
struct ExportPlan {
    conversions: Vec<ExportTask>,
    copies: Vec<ExportTask>,
}

impl<C: Converter + 'static> ExportRun<C> {
    async fn execute(self, folders: Vec<FolderDescriptor>, guard: RunningGuard) -> ExportSummary {
        self.reporter.counters().reset();

        if let Err(e) = fs::create_dir_all(&self.config.destination).await {
            self.reporter.error(format!(
                "Failed to create destination {}: {}",
                self.config.destination.display(),
                e
            ));
            return self.complete(guard);
        }

        if self.config.delete_stale {
            self.delete_stale_folders(&folders).await;
        }

        let plan = self.plan(&folders).await;

        if !plan.conversions.is_empty() {
            if let Err(e) = fs::create_dir_all(&self.config.temp_dir).await {
                self.reporter.error(format!(
                    "Failed to create temp directory {}: {}",
                    self.config.temp_dir.display(),
                    e
                ));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for task in plan.copies {
            // The receiver is alive until the consumer below finishes
            let _ = tx.send(task);
        }

        let consumer = CopyConsumer::new(rx, self.reporter.clone());
        let consumer = tokio::spawn(consumer.run());

        let pool = ConversionWorkerPool::new(
            Arc::clone(&self.converter),
            PoolSettings::from(&self.config),
            self.reporter.clone(),
            self.cancel.clone(),
        );
        // Moving the sender in closes the queue once every worker has enqueued
        let incomplete = pool.run(plan.conversions, tx).await;

        if let Err(e) = consumer.await {
            error!(error = %e, "Copy consumer failed");
        }

        self.remove_incomplete_folders(incomplete).await;
        self.complete(guard)
    }

    /// Publishes the final event. The exporter accepts a new export from
    /// the moment listeners see it.
    fn complete(&self, guard: RunningGuard) -> ExportSummary {
        let cancelled = self.cancel.is_cancelled();
        let summary = self.reporter.counters().summary(cancelled);
        drop(guard);

        let message = if cancelled {
            "Export cancelled"
        } else {
            "Export completed"
        };
        info!(
            copied = summary.copied,
            conversions = summary.total_conversion_tasks,
            errors = summary.errors,
            cancelled,
            "{}",
            message
        );
        self.reporter.emit(ExportStage::Completed, message);
        summary
    }

    /// Deletes destination folders that no selected folder maps to.
    async fn delete_stale_folders(&self, folders: &[FolderDescriptor]) {
        let desired: HashSet<String> = folders.iter().map(|f| f.destination_name()).collect();

        for name in list_subdirectories(&self.config.destination).await {
            if desired.contains(&name) {
                continue;
            }
            self.delete_folder(&self.config.destination.join(&name)).await;
        }
    }

    /// `DeleteEnd` follows `DeleteBegin` only when the folder is gone.
    async fn delete_folder(&self, path: &Path) {
        self.reporter
            .emit(ExportStage::DeleteBegin, format!("Deleting {}", path.display()));
        match fs::remove_dir_all(path).await {
            Ok(()) => {
                info!(path = %path.display(), "Deleted stale folder");
                self.reporter
                    .emit(ExportStage::DeleteEnd, format!("Deleted {}", path.display()));
            }
            Err(e) => {
                self.reporter
                    .error(format!("Failed to delete {}: {}", path.display(), e));
            }
        }
    }

    /// Removes folders a cancelled export left partly filled.
    ///
    /// An existing destination folder is never exported again, so leaving
    /// one half done would keep it incomplete for good.
    async fn remove_incomplete_folders(&self, folders: BTreeSet<PathBuf>) {
        for folder in folders {
            match fs::remove_dir_all(&folder).await {
                Ok(()) => info!(path = %folder.display(), "Removed incomplete folder"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %folder.display(),
                    error = %e,
                    "Failed to remove incomplete folder"
                ),
            }
        }
    }

    /// Turns the selected folders into tasks, skipping those already exported.
    async fn plan(&self, folders: &[FolderDescriptor]) -> ExportPlan {
        let mut plan = ExportPlan::default();
        let mut taken: HashSet<String> = list_subdirectories(&self.config.destination)
            .await
            .into_iter()
            .collect();
        let extension = self.config.target.extension();

        for folder in folders {
            if self.cancel.is_cancelled() {
                info!("Export cancelled, no further folders are planned");
                break;
            }

            let name = folder.destination_name();
            if !taken.insert(name.clone()) {
                info!(folder = %name, "Destination already exists, skipping");
                continue;
            }

            let files = match self.media_files(folder.path()).await {
                Ok(files) => files,
                Err(e) => {
                    self.reporter.error(format!(
                        "Failed to list {}: {}",
                        folder.path().display(),
                        e
                    ));
                    continue;
                }
            };
            if files.is_empty() {
                debug!(folder = %name, "No media files, skipping");
                continue;
            }

            let target_dir = self.config.destination.join(&name);
            if let Err(e) = recreate_dir(&target_dir).await {
                self.reporter.error(format!(
                    "Failed to create {}: {}",
                    target_dir.display(),
                    e
                ));
                continue;
            }

            for file in files {
                let Some(file_name) = destination_file_name(&file, extension) else {
                    warn!(file = %file.display(), "Skipping file without a name");
                    continue;
                };
                let task = ExportTask::new(&file, target_dir.join(file_name));

                let counters = self.reporter.counters();
                counters.add_copy_task();
                if task.needs_conversion() {
                    counters.add_conversion_task();
                    plan.conversions.push(task);
                } else {
                    plan.copies.push(task);
                }
            }
        }

        info!(
            conversions = plan.conversions.len(),
            direct_copies = plan.copies.len(),
            "Export planned"
        );
        plan
    }

    /// Media files directly inside `dir`, sorted by path.
    async fn media_files(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && is_media_file(&path, &self.config.extensions) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Names of the directories directly below `dir`. Unreadable entries are skipped.
async fn list_subdirectories(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to list directory");
            return names;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Failed to read directory entry");
                break;
            }
        }
    }
    names.sort();
    names
}

async fn recreate_dir(dir: &Path) -> std::io::Result<()> {
    if fs::try_exists(dir).await.unwrap_or(false) {
        fs::remove_dir_all(dir).await?;
    }
    fs::create_dir_all(dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::classify;
    use crate::testing::{MockConverter, RecordingListener};
    use tempfile::TempDir;

    struct Fixture {
        library: TempDir,
        output: TempDir,
        scratch: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                library: TempDir::new().unwrap(),
                output: TempDir::new().unwrap(),
                scratch: TempDir::new().unwrap(),
            }
        }

        fn folder(&self, relative: &str, files: &[&str]) -> FolderDescriptor {
            let dir = self.library.path().join(relative);
            std::fs::create_dir_all(&dir).unwrap();
            for file in files {
                std::fs::write(dir.join(file), file.as_bytes()).unwrap();
            }
            classify(self.library.path(), &dir).unwrap()
        }

        fn exporter(&self) -> Exporter<MockConverter> {
            let config = ExportConfig::new(self.output.path())
                .with_temp_dir(self.scratch.path().join("tmp"));
            Exporter::new(config, MockConverter::new())
        }
    }

    #[tokio::test]
    async fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::default();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_second_export_is_rejected() {
        let fx = Fixture::new();
        let exporter = fx.exporter();
        let folder = fx.folder("Art/Rec", &["song.flac"]);

        let handle = exporter.export(vec![folder.clone()]).unwrap();
        assert!(exporter.is_running());
        assert!(matches!(
            exporter.export(vec![folder]),
            Err(ExportError::AlreadyRunning)
        ));

        handle.wait().await.unwrap();
        assert!(!exporter.is_running());
    }

    #[tokio::test]
    async fn test_duplicate_destination_names_export_once() {
        let fx = Fixture::new();
        let exporter = fx.exporter();
        let first = fx.folder("Art/Rec/FLAC", &["a.flac"]);
        let second = fx.folder("Art/Rec/MP3", &["b.mp3"]);

        let summary = exporter.run(vec![first, second]).await.unwrap();

        assert_eq!(summary.total_copy_tasks, 1);
        assert!(fx.output.path().join("Art-Rec/a.mp3").exists());
        assert!(!fx.output.path().join("Art-Rec/b.mp3").exists());
    }

    #[tokio::test]
    async fn test_empty_selection_completes() {
        let fx = Fixture::new();
        let exporter = fx.exporter();
        let listener = RecordingListener::new();
        exporter.subscribe(listener.clone());

        let summary = exporter.run(Vec::new()).await.unwrap();

        assert_eq!(summary.total_copy_tasks, 0);
        assert_eq!(listener.stages(), vec![ExportStage::Completed]);
    }

    #[tokio::test]
    async fn test_non_media_files_are_ignored() {
        let fx = Fixture::new();
        let exporter = fx.exporter();
        let folder = fx.folder("Art/Rec", &["cover.jpg", "song.MP3", "notes.txt"]);

        let summary = exporter.run(vec![folder]).await.unwrap();

        assert_eq!(summary.total_copy_tasks, 1);
        assert_eq!(summary.total_conversion_tasks, 0);
        assert!(fx.output.path().join("Art-Rec/song.MP3").exists());
        assert!(!fx.output.path().join("Art-Rec/cover.jpg").exists());
    }

    #[tokio::test]
    async fn test_failed_deletion_has_no_delete_end() {
        let fx = Fixture::new();
        let listener = RecordingListener::new();
        let listeners = Arc::new(ListenerRegistry::new());
        listeners.register(Arc::new(listener.clone()));
        let run = ExportRun {
            config: ExportConfig::new(fx.output.path()),
            converter: Arc::new(MockConverter::new()),
            reporter: ProgressReporter::new(listeners, Arc::new(ExportCounters::default())),
            cancel: CancelFlag::default(),
        };

        run.delete_folder(&fx.output.path().join("Missing-Folder")).await;

        assert_eq!(
            listener.stages(),
            vec![ExportStage::DeleteBegin, ExportStage::Error]
        );
        assert_eq!(run.reporter.counters().errors(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_counters() {
        let fx = Fixture::new();
        let exporter = fx.exporter();
        let folder = fx.folder("Art/Rec", &["song.mp3"]);

        exporter.run(vec![folder]).await.unwrap();
        assert_eq!(exporter.progress().total_copy_tasks, 1);

        exporter.reset();
        assert_eq!(exporter.progress().total_copy_tasks, 0);
    }
}
