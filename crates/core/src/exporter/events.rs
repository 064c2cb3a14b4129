//! Progress events and the listeners that receive them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

/// Pipeline transition an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    CopyBegin,
    CopyEnd,
    ConvertBegin,
    ConvertEnd,
    DeleteBegin,
    DeleteEnd,
    Completed,
    Error,
}

impl ExportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CopyBegin => "copy_begin",
            Self::CopyEnd => "copy_end",
            Self::ConvertBegin => "convert_begin",
            Self::ConvertEnd => "convert_end",
            Self::DeleteBegin => "delete_begin",
            Self::DeleteEnd => "delete_end",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the export state at one transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgressEvent {
    pub stage: ExportStage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub total_copy_tasks: usize,
    pub remaining_copy_tasks: usize,
    pub elapsed_copy: Duration,
    pub total_conversion_tasks: usize,
    pub remaining_conversion_tasks: usize,
    pub elapsed_conversion: Duration,
}

impl ExportProgressEvent {
    pub fn copies_done(&self) -> usize {
        self.total_copy_tasks.saturating_sub(self.remaining_copy_tasks)
    }

    pub fn conversions_done(&self) -> usize {
        self.total_conversion_tasks
            .saturating_sub(self.remaining_conversion_tasks)
    }

    /// Estimated copy time left, extrapolated from the pace so far.
    pub fn copy_eta(&self) -> Duration {
        estimate_remaining(self.elapsed_copy, self.total_copy_tasks, self.copies_done())
    }

    /// Estimated conversion time left, extrapolated from the pace so far.
    pub fn conversion_eta(&self) -> Duration {
        estimate_remaining(
            self.elapsed_conversion,
            self.total_conversion_tasks,
            self.conversions_done(),
        )
    }
}

fn estimate_remaining(elapsed: Duration, total: usize, done: usize) -> Duration {
    if done == 0 {
        return Duration::ZERO;
    }
    let projected = elapsed.as_nanos() * total as u128 / done as u128;
    let remaining = projected.saturating_sub(elapsed.as_nanos());
    Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX))
}

/// Receives progress events.
///
/// Called synchronously on the thread of the emitting stage: a slow
/// listener stalls the pipeline.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ExportProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&ExportProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ExportProgressEvent) {
        self(event)
    }
}

/// Forwards events into a tokio channel for async consumers.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ExportProgressEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExportProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressListener for ChannelListener {
    fn on_progress(&self, event: &ExportProgressEvent) {
        // A dropped receiver just means nobody is watching anymore
        let _ = self.tx.send(event.clone());
    }
}

/// The set of listeners registered on an exporter.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn ProgressListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every listener registered at call time.
    pub fn notify(&self, event: &ExportProgressEvent) {
        // Snapshot so listeners may register others without deadlocking
        let listeners: Vec<Arc<dyn ProgressListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for listener in listeners {
            listener.on_progress(event);
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
