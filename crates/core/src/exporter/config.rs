//! Configuration for the exporter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::converter::TargetFormat;

/// Configuration for one exporter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root of the exported tree. Each exported folder is a direct child.
    pub destination: PathBuf,

    /// Directory for intermediate converted files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// File extensions picked up from source folders (no dot, any case).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Encoding every exported file ends up in.
    #[serde(default)]
    pub target: TargetFormat,

    /// Maximum parallel conversions. `None` runs the whole batch at once.
    #[serde(default)]
    pub max_parallel_conversions: Option<usize>,

    /// Time budget of a single conversion attempt in milliseconds.
    #[serde(default = "default_conversion_timeout")]
    pub conversion_timeout_ms: u64,

    /// Attempts per file before giving up on a conversion.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delete destination folders that are not part of the export.
    #[serde(default = "default_delete_stale")]
    pub delete_stale: bool,
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("musicmirror")
}

fn default_extensions() -> Vec<String> {
    vec!["flac".to_string(), "mp3".to_string()]
}

fn default_conversion_timeout() -> u64 {
    180_000 // 3 minutes
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delete_stale() -> bool {
    true
}

impl ExportConfig {
    /// Creates a config exporting to `destination` with default settings.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            temp_dir: default_temp_dir(),
            extensions: default_extensions(),
            target: TargetFormat::default(),
            max_parallel_conversions: None,
            conversion_timeout_ms: default_conversion_timeout(),
            max_attempts: default_max_attempts(),
            delete_stale: default_delete_stale(),
        }
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Caps the number of parallel conversions.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel_conversions = Some(max);
        self
    }

    /// Sets the per-attempt conversion timeout.
    pub fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the number of conversion attempts per file.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Enables or disables deletion of stale destination folders.
    pub fn with_delete_stale(mut self, enabled: bool) -> Self {
        self.delete_stale = enabled;
        self
    }

    /// Sets the target encoding.
    pub fn with_target(mut self, target: TargetFormat) -> Self {
        self.target = target;
        self
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_millis(self.conversion_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::new("/export");
        assert_eq!(config.destination, PathBuf::from("/export"));
        assert_eq!(config.extensions, vec!["flac", "mp3"]);
        assert_eq!(config.target.extension(), "mp3");
        assert_eq!(config.max_parallel_conversions, None);
        assert_eq!(config.conversion_timeout(), Duration::from_secs(180));
        assert_eq!(config.max_attempts, 3);
        assert!(config.delete_stale);
    }

    #[test]
    fn test_config_builder() {
        let config = ExportConfig::new("/export")
            .with_temp_dir("/tmp/test")
            .with_max_parallel(2)
            .with_conversion_timeout(Duration::from_millis(250))
            .with_max_attempts(5)
            .with_delete_stale(false);

        assert_eq!(config.temp_dir, PathBuf::from("/tmp/test"));
        assert_eq!(config.max_parallel_conversions, Some(2));
        assert_eq!(config.conversion_timeout_ms, 250);
        assert_eq!(config.max_attempts, 5);
        assert!(!config.delete_stale);
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: ExportConfig = toml::from_str(r#"destination = "/srv/export""#).unwrap();
        assert_eq!(config, ExportConfig::new("/srv/export"));
    }

    #[test]
    fn test_deserialize_requires_destination() {
        let result: Result<ExportConfig, _> = toml::from_str("max_attempts = 2");
        assert!(result.is_err());
    }
}
