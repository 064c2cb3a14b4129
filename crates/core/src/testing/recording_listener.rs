//! Progress listener that keeps every event for assertions.

use std::sync::{Arc, Mutex};

use crate::exporter::{ExportProgressEvent, ExportStage, ProgressListener};

/// Records every event it receives, in delivery order.
///
/// Clones share the same record, so a test keeps one clone and hands the
/// other to the exporter.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ExportProgressEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExportProgressEvent> {
        self.lock().clone()
    }

    pub fn stages(&self) -> Vec<ExportStage> {
        self.lock().iter().map(|e| e.stage).collect()
    }

    /// Number of events recorded for `stage`.
    pub fn count(&self, stage: ExportStage) -> usize {
        self.lock().iter().filter(|e| e.stage == stage).count()
    }

    pub fn last(&self) -> Option<ExportProgressEvent> {
        self.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ExportProgressEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressListener for RecordingListener {
    fn on_progress(&self, event: &ExportProgressEvent) {
        self.lock().push(event.clone());
    }
}
