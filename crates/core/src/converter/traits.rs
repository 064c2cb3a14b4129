//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::ConverterError;
use super::types::{ConversionOutcome, ConversionRequest};

/// A converter that can transcode one file into the target format.
///
/// Implementations must tolerate being called again for the same source with
/// a fresh output path, and must stop their work when the returned future is
/// dropped.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts `request.source` into `request.output`.
    async fn convert(&self, request: ConversionRequest)
        -> Result<ConversionOutcome, ConverterError>;

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;
}

#[async_trait]
impl<C: Converter + ?Sized> Converter for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutcome, ConverterError> {
        (**self).convert(request).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        (**self).validate().await
    }
}
