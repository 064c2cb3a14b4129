//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Audio format an exported library is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Audio Layer III
    Mp3,
    /// Free Lossless Audio Codec (lossless)
    Flac,
    /// Advanced Audio Coding
    Aac,
    /// Ogg Vorbis
    OggVorbis,
    /// Opus
    Opus,
}

impl AudioFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Aac => "m4a",
            Self::OggVorbis => "ogg",
            Self::Opus => "opus",
        }
    }

    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Flac => "flac",
            Self::Aac => "aac",
            Self::OggVorbis => "libvorbis",
            Self::Opus => "libopus",
        }
    }

    /// Whether this format is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac)
    }
}

/// Encoding parameters for converted files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFormat {
    /// Output format.
    #[serde(default = "default_format")]
    pub format: AudioFormat,

    /// Variable bitrate quality (codec scale, lower is better for mp3).
    /// Ignored for lossless formats and when `bitrate_kbps` is set.
    #[serde(default = "default_vbr_quality")]
    pub vbr_quality: Option<u8>,

    /// Constant bitrate in kbps.
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
}

fn default_format() -> AudioFormat {
    AudioFormat::Mp3
}

fn default_vbr_quality() -> Option<u8> {
    Some(2)
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self {
            format: default_format(),
            vbr_quality: default_vbr_quality(),
            bitrate_kbps: None,
        }
    }
}

impl TargetFormat {
    /// File extension of converted files, without the dot.
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// A single conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Identifier used in logs.
    pub job_id: String,
    /// File to convert.
    pub source: PathBuf,
    /// Where the converted file must be written. Fresh for every attempt.
    pub output: PathBuf,
    /// Encoding parameters.
    pub target: TargetFormat,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub job_id: String,
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_extension() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Aac.extension(), "m4a");
        assert_eq!(AudioFormat::OggVorbis.ffmpeg_codec(), "libvorbis");
        assert!(AudioFormat::Flac.is_lossless());
        assert!(!AudioFormat::Mp3.is_lossless());
    }

    #[test]
    fn test_target_format_defaults_from_toml() {
        let target: TargetFormat = toml::from_str("").unwrap();
        assert_eq!(target, TargetFormat::default());
        assert_eq!(target.extension(), "mp3");
        assert_eq!(target.vbr_quality, Some(2));

        let target: TargetFormat = toml::from_str(
            r#"
format = "ogg_vorbis"
bitrate_kbps = 192
"#,
        )
        .unwrap();
        assert_eq!(target.extension(), "ogg");
        assert_eq!(target.bitrate_kbps, Some(192));
    }
}
