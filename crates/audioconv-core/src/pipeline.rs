//! Conversion stage sequencing.
//!
//! `Converting → Classifying → Failed` or `Converting → Publishing`. Cleanup
//! is carried by guards rather than duplicated per error site: the
//! [`ScratchFile`] is removed before the outcome is returned, and a
//! [`PendingArtifact`] deletes partial output unless the run is committed.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::artifact::{OutputArtifact, PendingArtifact};
use crate::classify::classify;
use crate::converter::Converter;
use crate::error::ConvertError;
use crate::format::{DeliveryMode, TargetFormat};
use crate::ingest::ScratchFile;
use crate::storage::StoragePaths;

/// One client request, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source_filename: Option<String>,
    pub target_format: TargetFormat,
    pub delivery: DeliveryMode,
}

/// Runs the converter for ingested uploads.
///
/// At most `max_concurrent` converter processes run at once; further
/// requests wait for a slot. The slot is held for the converter run only.
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    paths: StoragePaths,
    converter: Arc<dyn Converter>,
    limiter: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConversionPipeline {
    pub fn new(paths: StoragePaths, converter: Arc<dyn Converter>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            paths,
            converter,
            limiter: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Convert `scratch` according to `request`.
    ///
    /// Consumes the scratch file; it is gone from disk when this returns,
    /// whatever the outcome. On failure no output file remains either.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        scratch: ScratchFile,
    ) -> Result<OutputArtifact, ConvertError> {
        let pending = PendingArtifact::allocate(
            &self.paths,
            request.source_filename.as_deref(),
            request.target_format,
        );

        let run = {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|_| ConvertError::Internal("conversion limiter closed".into()))?;
            debug!(
                available = self.limiter.available_permits(),
                output = %pending.artifact().file_name(),
                "conversion slot acquired"
            );
            self.converter
                .convert(scratch.path(), pending.path(), request.target_format)
                .await?
        };

        scratch.discard().await;

        if let Some(failure) = classify(&run) {
            warn!(
                category = %failure.category,
                exit_code = ?run.exit_code,
                output = %pending.artifact().file_name(),
                "conversion failed"
            );
            return Err(failure.into_error());
        }

        let artifact = pending.commit();
        info!(
            output = %artifact.file_name(),
            format = %artifact.format(),
            elapsed_ms = run.elapsed.as_millis(),
            "conversion succeeded"
        );
        Ok(artifact)
    }
}
