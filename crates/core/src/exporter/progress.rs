//! Shared counters of a running export and the reporter that publishes them.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use super::events::{ExportProgressEvent, ExportStage, ListenerRegistry};

/// Final state of an export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub total_copy_tasks: usize,
    pub copied: usize,
    pub total_conversion_tasks: usize,
    pub remaining_copy_tasks: usize,
    pub remaining_conversion_tasks: usize,
    pub errors: usize,
    pub elapsed_copy: Duration,
    pub elapsed_conversion: Duration,
    pub cancelled: bool,
}

/// Counters shared by the orchestrator, the conversion workers and the copy
/// consumer. Every update is atomic.
#[derive(Debug, Default)]
pub struct ExportCounters {
    total_copy: AtomicUsize,
    remaining_copy: AtomicUsize,
    copied: AtomicUsize,
    total_conversion: AtomicUsize,
    remaining_conversion: AtomicUsize,
    errors: AtomicUsize,
    elapsed_copy_ms: AtomicU64,
    elapsed_conversion_ms: AtomicU64,
}

impl ExportCounters {
    pub fn reset(&self) {
        for counter in [
            &self.total_copy,
            &self.remaining_copy,
            &self.copied,
            &self.total_conversion,
            &self.remaining_conversion,
            &self.errors,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        self.elapsed_copy_ms.store(0, Ordering::SeqCst);
        self.elapsed_conversion_ms.store(0, Ordering::SeqCst);
    }

    pub fn add_copy_task(&self) {
        self.total_copy.fetch_add(1, Ordering::SeqCst);
        self.remaining_copy.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_conversion_task(&self) {
        self.total_conversion.fetch_add(1, Ordering::SeqCst);
        self.remaining_conversion.fetch_add(1, Ordering::SeqCst);
    }

    /// A copy task left the queue; `placed` tells whether it reached the destination.
    pub fn copy_finished(&self, placed: bool) {
        decrement(&self.remaining_copy);
        if placed {
            self.copied.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn conversion_finished(&self) {
        decrement(&self.remaining_conversion);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    /// Raises the copy stopwatch; it never goes backwards.
    pub fn record_copy_elapsed(&self, elapsed: Duration) {
        self.elapsed_copy_ms
            .fetch_max(elapsed.as_millis() as u64, Ordering::SeqCst);
    }

    /// Raises the conversion stopwatch; it never goes backwards.
    pub fn record_conversion_elapsed(&self, elapsed: Duration) {
        self.elapsed_conversion_ms
            .fetch_max(elapsed.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, stage: ExportStage, message: impl Into<String>) -> ExportProgressEvent {
        ExportProgressEvent {
            stage,
            message: message.into(),
            timestamp: Utc::now(),
            total_copy_tasks: self.total_copy.load(Ordering::SeqCst),
            remaining_copy_tasks: self.remaining_copy.load(Ordering::SeqCst),
            elapsed_copy: Duration::from_millis(self.elapsed_copy_ms.load(Ordering::SeqCst)),
            total_conversion_tasks: self.total_conversion.load(Ordering::SeqCst),
            remaining_conversion_tasks: self.remaining_conversion.load(Ordering::SeqCst),
            elapsed_conversion: Duration::from_millis(
                self.elapsed_conversion_ms.load(Ordering::SeqCst),
            ),
        }
    }

    pub fn summary(&self, cancelled: bool) -> ExportSummary {
        ExportSummary {
            total_copy_tasks: self.total_copy.load(Ordering::SeqCst),
            copied: self.copied.load(Ordering::SeqCst),
            total_conversion_tasks: self.total_conversion.load(Ordering::SeqCst),
            remaining_copy_tasks: self.remaining_copy.load(Ordering::SeqCst),
            remaining_conversion_tasks: self.remaining_conversion.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            elapsed_copy: Duration::from_millis(self.elapsed_copy_ms.load(Ordering::SeqCst)),
            elapsed_conversion: Duration::from_millis(
                self.elapsed_conversion_ms.load(Ordering::SeqCst),
            ),
            cancelled,
        }
    }
}

fn decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
        Some(v.saturating_sub(1))
    });
}

/// Builds events from the shared counters and hands them to the listeners.
///
/// Cheap to clone; every stage of an export holds one.
#[derive(Debug, Clone)]
pub(crate) struct ProgressReporter {
    listeners: Arc<ListenerRegistry>,
    counters: Arc<ExportCounters>,
}

impl ProgressReporter {
    pub(crate) fn new(listeners: Arc<ListenerRegistry>, counters: Arc<ExportCounters>) -> Self {
        Self {
            listeners,
            counters,
        }
    }

    pub(crate) fn counters(&self) -> &ExportCounters {
        &self.counters
    }

    pub(crate) fn emit(&self, stage: ExportStage, message: impl Into<String>) {
        let event = self.counters.snapshot(stage, message);
        debug!(stage = %event.stage, message = %event.message, "Export progress");
        self.listeners.notify(&event);
    }

    /// Counts, logs and publishes a per-item failure.
    pub(crate) fn error(&self, message: impl Into<String>) {
        let message = message.into();
        self.counters.record_error();
        error!("{}", message);
        self.emit(ExportStage::Error, message);
    }
}
