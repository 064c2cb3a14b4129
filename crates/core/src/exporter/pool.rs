//! Conversion stage: parallel workers feeding the copy queue.

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::converter::{ConversionOutcome, ConversionRequest, Converter, ConverterError, TargetFormat};

use super::config::ExportConfig;
use super::events::ExportStage;
use super::orchestrator::CancelFlag;
use super::progress::ProgressReporter;
use super::task::ExportTask;

/// Settings a pool runs with, taken from the export configuration.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub temp_dir: PathBuf,
    pub target: TargetFormat,
    pub max_parallel: Option<usize>,
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
}

impl From<&ExportConfig> for PoolSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            target: config.target.clone(),
            max_parallel: config.max_parallel_conversions,
            attempt_timeout: config.conversion_timeout(),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// Runs the conversion batch and pushes every task onto the copy queue.
pub(crate) struct ConversionWorkerPool<C: Converter> {
    converter: Arc<C>,
    settings: PoolSettings,
    reporter: ProgressReporter,
    cancel: CancelFlag,
}

impl<C: Converter> ConversionWorkerPool<C> {
    pub(crate) fn new(
        converter: Arc<C>,
        settings: PoolSettings,
        reporter: ProgressReporter,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            converter,
            settings,
            reporter,
            cancel,
        }
    }

    /// Converts `batch` and forwards each task to `queue`.
    ///
    /// The sender is dropped when this returns, after every worker has
    /// enqueued its task, which is what lets the copy consumer terminate.
    ///
    /// Returns the destination folders of tasks dropped because the export
    /// was cancelled before their conversion started.
    pub(crate) async fn run(
        &self,
        batch: Vec<ExportTask>,
        queue: mpsc::UnboundedSender<ExportTask>,
    ) -> BTreeSet<PathBuf> {
        if batch.is_empty() {
            return BTreeSet::new();
        }

        let skipped = Mutex::new(BTreeSet::new());
        let started = Instant::now();
        info!(
            tasks = batch.len(),
            max_parallel = ?self.settings.max_parallel,
            converter = self.converter.name(),
            "Starting conversions"
        );

        stream::iter(batch)
            .for_each_concurrent(self.settings.max_parallel, |task| {
                let queue = &queue;
                let skipped = &skipped;
                async move {
                    if self.cancel.is_cancelled() {
                        self.skip(&task, skipped);
                        return;
                    }

                    let task = self.convert_task(task).await;
                    let message = if task.conversion_failed() {
                        format!("Gave up converting {}", task.source_path().display())
                    } else {
                        format!("Converted {}", task.source_path().display())
                    };

                    if queue.send(task).is_err() {
                        warn!("Copy queue closed, converted file will not be placed");
                    }

                    let counters = self.reporter.counters();
                    counters.conversion_finished();
                    counters.record_conversion_elapsed(started.elapsed());
                    self.reporter.emit(ExportStage::ConvertEnd, message);
                }
            })
            .await;

        info!(elapsed = ?started.elapsed(), "Conversions finished");
        skipped
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Settles the counters of a task that will never be converted or copied.
    fn skip(&self, task: &ExportTask, skipped: &Mutex<BTreeSet<PathBuf>>) {
        info!(source = %task.source_path().display(), "Export cancelled, skipping conversion");

        let counters = self.reporter.counters();
        counters.conversion_finished();
        counters.copy_finished(false);

        if let Some(folder) = task.destination_path().parent() {
            skipped
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(folder.to_path_buf());
        }
    }

    /// Converts one task, retrying up to the attempt limit.
    ///
    /// The task always comes back with a converted path: on exhaustion it is
    /// the last attempt's output, which the copy stage may find missing.
    async fn convert_task(&self, mut task: ExportTask) -> ExportTask {
        self.reporter.emit(
            ExportStage::ConvertBegin,
            format!("Converting {}", task.source_path().display()),
        );

        let job_id = task
            .source_path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut last_output = None;
        let mut last_error = None;

        for attempt in 1..=self.settings.max_attempts {
            let output = self.temp_path();

            match self.attempt(&job_id, &task, output.clone(), attempt).await {
                Ok(outcome) => {
                    info!(
                        job_id = %job_id,
                        attempt,
                        duration_ms = outcome.duration_ms,
                        "Conversion succeeded"
                    );
                    last_output = Some(outcome.output_path);
                    last_error = None;
                    break;
                }
                Err(e) => {
                    warn!(job_id = %job_id, attempt, error = %e, "Conversion attempt failed");
                    if attempt < self.settings.max_attempts {
                        remove_partial_output(&output).await;
                    }
                    last_output = Some(output);
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            self.reporter.error(format!(
                "Conversion of {} failed after {} attempts: {}",
                task.source_path().display(),
                self.settings.max_attempts,
                e
            ));
            task.mark_conversion_failed();
        }

        if let Some(output) = last_output {
            task.set_converted_path(output);
        }
        task
    }

    /// Runs one attempt under the per-attempt timeout.
    ///
    /// On timeout the converter future is dropped, which terminates it.
    async fn attempt(
        &self,
        job_id: &str,
        task: &ExportTask,
        output: PathBuf,
        attempt: u32,
    ) -> Result<ConversionOutcome, ConverterError> {
        let request = ConversionRequest {
            job_id: job_id.to_string(),
            source: task.source_path().to_path_buf(),
            output,
            target: self.settings.target.clone(),
            attempt,
        };

        match timeout(self.settings.attempt_timeout, self.converter.convert(request)).await {
            Ok(result) => result,
            Err(_) => Err(ConverterError::Timeout {
                timeout: self.settings.attempt_timeout,
            }),
        }
    }

    fn temp_path(&self) -> PathBuf {
        self.settings
            .temp_dir
            .join(format!("{}.{}", Uuid::new_v4(), self.settings.target.extension()))
    }
}

async fn remove_partial_output(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
