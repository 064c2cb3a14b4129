//! Converter module for transcoding audio files.
//!
//! This module provides the `Converter` trait, the seam the exporter drives
//! for every file whose encoding differs from the target, and an FFmpeg
//! subprocess implementation.
//!
//! A converter only runs one attempt. Timeouts and retries belong to the
//! caller: dropping the `convert` future must stop the work, which the FFmpeg
//! implementation guarantees by killing the child process on drop.
//!
//! # Example
//!
//! ```ignore
//! use musicmirror_core::converter::{Converter, ConversionRequest, FfmpegConverter, TargetFormat};
//!
//! let converter = FfmpegConverter::with_defaults();
//! converter.validate().await?;
//!
//! let outcome = converter
//!     .convert(ConversionRequest {
//!         job_id: "song".to_string(),
//!         source: PathBuf::from("/music/Artist/Record/song.flac"),
//!         output: PathBuf::from("/tmp/musicmirror/0b5c.mp3"),
//!         target: TargetFormat::default(),
//!         attempt: 1,
//!     })
//!     .await?;
//! println!("Converted in {} ms", outcome.duration_ms);
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::ConverterConfig;
pub use error::ConverterError;
pub use ffmpeg::FfmpegConverter;
pub use traits::Converter;
pub use types::{AudioFormat, ConversionOutcome, ConversionRequest, TargetFormat};
