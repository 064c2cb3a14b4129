//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::{ConversionOutcome, ConversionRequest, Converter, ConverterError};

/// What the mock does for one conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Copy the source bytes to the requested output.
    Succeed,
    /// Fail with a conversion error carrying this reason.
    Fail(String),
    /// Never return; only a caller timeout ends the attempt.
    Hang,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Script per-source outcomes, consumed one per attempt
/// - Record every request for assertions
/// - Track how many conversions ran at the same time
///
/// Sources without a script succeed by copying their bytes to the output.
///
/// # Example
///
/// ```rust,ignore
/// use musicmirror_core::testing::{MockBehavior, MockConverter};
///
/// let converter = MockConverter::new();
/// converter
///     .script("/music/Art/Rec/song.flac", [MockBehavior::Hang, MockBehavior::Succeed])
///     .await;
///
/// // First attempt hangs until the caller times out, the second succeeds
/// let requests = converter.recorded_requests().await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockConverter {
    /// Every request received, in arrival order.
    requests: Arc<RwLock<Vec<ConversionRequest>>>,
    /// Remaining scripted behaviors by source path.
    scripts: Arc<RwLock<HashMap<PathBuf, VecDeque<MockBehavior>>>>,
    /// Simulated conversion duration in milliseconds.
    conversion_duration_ms: Arc<RwLock<u64>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Decrements the active count when an attempt ends or is dropped.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues behaviors for the attempts on `source`, in order.
    pub async fn script(
        &self,
        source: impl AsRef<Path>,
        behaviors: impl IntoIterator<Item = MockBehavior>,
    ) {
        self.scripts
            .write()
            .await
            .entry(source.as_ref().to_path_buf())
            .or_default()
            .extend(behaviors);
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<ConversionRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of attempts received.
    pub async fn conversion_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Attempts received for one source.
    pub async fn attempts_for(&self, source: impl AsRef<Path>) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.source == source.as_ref())
            .count()
    }

    /// Highest number of attempts that ran at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn next_behavior(&self, source: &Path) -> MockBehavior {
        self.scripts
            .write()
            .await
            .get_mut(source)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(MockBehavior::Succeed)
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutcome, ConverterError> {
        self.requests.write().await.push(request.clone());

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        let _guard = ActiveGuard(Arc::clone(&self.active));

        let duration_ms = *self.conversion_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        match self.next_behavior(&request.source).await {
            MockBehavior::Succeed => {
                if let Some(parent) = request.output.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let bytes = tokio::fs::copy(&request.source, &request.output).await?;
                Ok(ConversionOutcome {
                    job_id: request.job_id,
                    output_path: request.output,
                    output_size_bytes: bytes,
                    duration_ms,
                })
            }
            MockBehavior::Fail(reason) => Err(ConverterError::conversion_failed(reason, None)),
            MockBehavior::Hang => std::future::pending().await,
        }
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::TargetFormat;
    use tempfile::TempDir;

    fn request(source: &Path, output: &Path, attempt: u32) -> ConversionRequest {
        ConversionRequest {
            job_id: "song.flac".to_string(),
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            target: TargetFormat::default(),
            attempt,
        }
    }

    #[tokio::test]
    async fn test_unscripted_source_succeeds() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("song.flac");
        let output = dir.path().join("out/song.mp3");
        std::fs::write(&source, b"flac").unwrap();

        let converter = MockConverter::new();
        let outcome = converter.convert(request(&source, &output, 1)).await.unwrap();

        assert_eq!(outcome.output_size_bytes, 4);
        assert_eq!(std::fs::read(&output).unwrap(), b"flac");
        assert_eq!(converter.conversion_count().await, 1);
    }

    #[tokio::test]
    async fn test_script_is_consumed_in_order() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("song.flac");
        std::fs::write(&source, b"flac").unwrap();

        let converter = MockConverter::new();
        converter
            .script(&source, [MockBehavior::Fail("first".to_string())])
            .await;

        let first = converter
            .convert(request(&source, &dir.path().join("a.mp3"), 1))
            .await;
        assert!(first.is_err());

        let second = converter
            .convert(request(&source, &dir.path().join("b.mp3"), 2))
            .await;
        assert!(second.is_ok());
        assert_eq!(converter.attempts_for(&source).await, 2);
    }

    #[tokio::test]
    async fn test_hang_ends_with_timeout() {
        let converter = MockConverter::new();
        converter
            .script("/music/song.flac", [MockBehavior::Hang])
            .await;

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            converter.convert(request(
                Path::new("/music/song.flac"),
                Path::new("/tmp/song.mp3"),
                1,
            )),
        )
        .await;

        assert!(result.is_err());
        // The dropped attempt no longer counts as active
        assert_eq!(converter.active.load(Ordering::SeqCst), 0);
        assert_eq!(converter.peak_concurrency(), 1);
    }
}
