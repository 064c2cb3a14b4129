//! Copy stage: the single writer of the destination tree.

use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::CopyError;
use super::events::ExportStage;
use super::progress::ProgressReporter;
use super::task::ExportTask;

/// Drains the copy queue one task at a time.
///
/// Cancellation is not checked here: whatever reached the queue is placed,
/// so a cancelled export still drains it.
pub(crate) struct CopyConsumer {
    queue: mpsc::UnboundedReceiver<ExportTask>,
    reporter: ProgressReporter,
}

impl CopyConsumer {
    pub(crate) fn new(queue: mpsc::UnboundedReceiver<ExportTask>, reporter: ProgressReporter) -> Self {
        Self { queue, reporter }
    }

    /// Places every queued task until all senders are gone.
    ///
    /// Returns the tasks it handled, placed or not.
    pub(crate) async fn run(mut self) -> Vec<ExportTask> {
        let started = Instant::now();
        let mut handled = Vec::new();

        while let Some(mut task) = self.queue.recv().await {
            self.reporter.emit(
                ExportStage::CopyBegin,
                format!("Copying {}", task.destination_path().display()),
            );

            let placed = match place(&task).await {
                Ok(()) => {
                    task.mark_done();
                    true
                }
                Err(CopyError::ConvertedOutputMissing { path }) if task.conversion_failed() => {
                    warn!(
                        source = %task.source_path().display(),
                        output = %path.display(),
                        "No converted output to copy"
                    );
                    false
                }
                Err(e) => {
                    self.reporter.error(format!(
                        "Failed to copy {}: {}",
                        task.source_path().display(),
                        e
                    ));
                    false
                }
            };

            let counters = self.reporter.counters();
            counters.copy_finished(placed);
            counters.record_copy_elapsed(started.elapsed());

            if placed {
                self.reporter.emit(
                    ExportStage::CopyEnd,
                    format!("Copied {}", task.destination_path().display()),
                );
            }
            handled.push(task);
        }

        info!(copied = handled.iter().filter(|t| t.is_done()).count(), "Copy queue drained");
        handled
    }
}

/// Places one task at its destination.
///
/// Direct copies never overwrite. Converted files overwrite and the
/// intermediate file is removed whatever the outcome. A failed conversion
/// may have left nothing behind, which is reported as
/// [`CopyError::ConvertedOutputMissing`].
async fn place(task: &ExportTask) -> Result<(), CopyError> {
    if !task.ready_to_copy() {
        return Err(CopyError::NotReady {
            path: task.source_path().to_path_buf(),
        });
    }

    let destination = task.destination_path();

    match task.converted_path() {
        Some(converted) if task.needs_conversion() => {
            if !fs::try_exists(converted).await.unwrap_or(false) {
                return Err(CopyError::ConvertedOutputMissing {
                    path: converted.to_path_buf(),
                });
            }
            let result = copy_file(converted, destination).await;
            discard_converted(task).await;
            result
        }
        _ => {
            if fs::try_exists(destination).await.unwrap_or(false) {
                return Err(CopyError::DestinationExists {
                    path: destination.to_path_buf(),
                });
            }
            copy_file(task.source_path(), destination).await
        }
    }
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), CopyError> {
    match fs::copy(from, to).await {
        Ok(bytes) => {
            debug!(from = %from.display(), to = %to.display(), bytes, "File copied");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !from.exists() => {
            Err(CopyError::SourceNotFound {
                path: from.to_path_buf(),
            })
        }
        Err(e) => Err(CopyError::copy_failed(from.to_path_buf(), to.to_path_buf(), e)),
    }
}

async fn discard_converted(task: &ExportTask) {
    let Some(converted) = task.converted_path() else {
        return;
    };
    if let Err(e) = fs::remove_file(converted).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %converted.display(), error = %e, "Failed to delete temp file");
        }
    }
}
