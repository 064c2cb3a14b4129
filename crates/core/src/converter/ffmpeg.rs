//! FFmpeg-based converter implementation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::Converter;
use super::types::{ConversionOutcome, ConversionRequest, TargetFormat};

/// FFmpeg-based converter implementation.
pub struct FfmpegConverter {
    config: ConverterConfig,
}

impl FfmpegConverter {
    /// Creates a new FFmpeg converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    /// Builds ffmpeg arguments for one conversion.
    fn build_args(&self, input_path: &Path, output_path: &Path, target: &TargetFormat) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            // Keep tags from the source
            "-map_metadata".to_string(),
            "0".to_string(),
        ];

        // Audio codec
        args.extend(["-c:a".to_string(), target.format.ffmpeg_codec().to_string()]);

        // Bitrate wins over VBR quality; lossless formats take neither
        if !target.format.is_lossless() {
            if let Some(bitrate) = target.bitrate_kbps {
                args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
            } else if let Some(quality) = target.vbr_quality {
                args.extend(["-q:a".to_string(), quality.to_string()]);
            }
        }

        // Log level
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output
        args.push(output_path.to_string_lossy().to_string());

        args
    }

    /// Runs a single ffmpeg process to completion.
    async fn run_conversion(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, ConverterError> {
        let start = Instant::now();

        if !tokio::fs::try_exists(&request.source).await.unwrap_or(false) {
            return Err(ConverterError::InputNotFound {
                path: request.source.clone(),
            });
        }

        // Ensure output directory exists
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                ConverterError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        let args = self.build_args(&request.source, &request.output, &request.target);
        debug!(job_id = %request.job_id, attempt = request.attempt, ?args, "Spawning ffmpeg");

        // The child dies with the future, so a caller-side timeout terminates it
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        let mut error_output = String::new();
        if let Some(stderr) = child.stderr.take() {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                error_output.push_str(&line);
                error_output.push('\n');
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(ConverterError::conversion_failed(
                format!("FFmpeg exited with code: {:?}", status.code()),
                if error_output.is_empty() {
                    None
                } else {
                    Some(error_output)
                },
            ));
        }

        // Verify output exists and get size
        let output_meta = tokio::fs::metadata(&request.output)
            .await
            .map_err(|_| ConverterError::conversion_failed("Output file not created", None))?;

        Ok(ConversionOutcome {
            job_id: request.job_id.clone(),
            output_path: request.output.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutcome, ConverterError> {
        self.run_conversion(&request).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        let result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(ConverterError::conversion_failed(
                "ffmpeg -version failed",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConverterError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                })
            }
            Err(e) => Err(ConverterError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::AudioFormat;
    use std::path::PathBuf;

    #[test]
    fn test_build_args_mp3_vbr() {
        let converter = FfmpegConverter::with_defaults();
        let args = converter.build_args(
            Path::new("/input.flac"),
            Path::new("/output.mp3"),
            &TargetFormat::default(),
        );

        assert_eq!(args[0], "-y");
        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"-q:a".to_string()));
        assert!(args.contains(&"2".to_string()));
        assert!(!args.contains(&"-b:a".to_string()));
        assert_eq!(args.last().unwrap(), "/output.mp3");
    }

    #[test]
    fn test_build_args_bitrate_wins() {
        let converter = FfmpegConverter::with_defaults();
        let target = TargetFormat {
            format: AudioFormat::Mp3,
            vbr_quality: Some(0),
            bitrate_kbps: Some(320),
        };
        let args = converter.build_args(Path::new("/in.flac"), Path::new("/out.mp3"), &target);

        assert!(args.contains(&"-b:a".to_string()));
        assert!(args.contains(&"320k".to_string()));
        assert!(!args.contains(&"-q:a".to_string()));
    }

    #[test]
    fn test_build_args_lossless_has_no_quality() {
        let converter = FfmpegConverter::with_defaults();
        let target = TargetFormat {
            format: AudioFormat::Flac,
            vbr_quality: Some(2),
            bitrate_kbps: Some(320),
        };
        let args = converter.build_args(Path::new("/in.mp3"), Path::new("/out.flac"), &target);

        assert!(args.contains(&"flac".to_string()));
        assert!(!args.contains(&"-b:a".to_string()));
        assert!(!args.contains(&"-q:a".to_string()));
    }

    #[test]
    fn test_build_args_extra_before_output() {
        let config = ConverterConfig::default()
            .with_extra_args(["-threads".to_string(), "1".to_string()]);
        let converter = FfmpegConverter::new(config);
        let args = converter.build_args(
            Path::new("/in.flac"),
            Path::new("/out.mp3"),
            &TargetFormat::default(),
        );

        let n = args.len();
        assert_eq!(&args[n - 3..], &["-threads", "1", "/out.mp3"]);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let converter =
            FfmpegConverter::new(ConverterConfig::with_path(PathBuf::from("/nonexistent/ffmpeg")));
        let result = converter.validate().await;
        assert!(matches!(result, Err(ConverterError::FfmpegNotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let converter = FfmpegConverter::with_defaults();
        let result = converter
            .convert(ConversionRequest {
                job_id: "job".to_string(),
                source: dir.path().join("missing.flac"),
                output: dir.path().join("out.mp3"),
                target: TargetFormat::default(),
                attempt: 1,
            })
            .await;
        assert!(matches!(result, Err(ConverterError::InputNotFound { .. })));
    }
}
