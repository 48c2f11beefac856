//! Conversion-request lifecycle for the audioconv service.
//!
//! The crate is HTTP-agnostic: the server binary feeds it byte streams and
//! maps its [`ConvertError`] taxonomy onto status codes.
//!
//! Lifecycle of a single request:
//!
//! 1. [`UploadIngestor::ingest`] streams the upload into a [`ScratchFile`].
//! 2. [`ConversionPipeline::convert`] runs the [`Converter`] under the
//!    concurrency limit and timeout.
//! 3. [`classify`] turns a failed [`ConverterRun`] into an [`ErrorCategory`].
//! 4. On success the committed [`OutputArtifact`] is published by the caller.

pub mod artifact;
pub mod classify;
pub mod converter;
pub mod error;
pub mod format;
pub mod health;
pub mod ingest;
pub mod pipeline;
pub mod storage;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use artifact::{OutputArtifact, PendingArtifact, ResolvedArtifact, resolve_download};
pub use classify::{Classification, classify};
pub use converter::{Converter, ConverterRun, FfmpegConverter};
pub use error::{ConvertError, ErrorCategory};
pub use format::{DeliveryMode, TargetFormat, media_type_for_path};
pub use health::{HealthReport, HealthStatus, ToolStatus};
pub use ingest::{ScratchFile, UploadIngestor};
pub use pipeline::{ConversionPipeline, ConversionRequest};
pub use storage::StoragePaths;
