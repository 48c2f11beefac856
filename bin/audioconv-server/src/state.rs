//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use audioconv_core::{ConversionPipeline, ConvertError, Converter, StoragePaths, UploadIngestor};

use crate::config::Config;

/// State shared across all HTTP handlers.
///
/// Resolved once at startup and immutable afterwards; the only state that
/// changes between requests lives on the filesystem.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Canonical scratch and output roots.
    pub paths: StoragePaths,
    /// Upload → scratch file.
    pub ingestor: UploadIngestor,
    /// Scratch file → output artifact.
    pub pipeline: ConversionPipeline,
}

impl AppState {
    /// Create the storage roots and wire the lifecycle components.
    pub async fn new(config: Config, converter: Arc<dyn Converter>) -> Result<Self, ConvertError> {
        let paths = StoragePaths::prepare(&config.temp_dir, &config.output_dir).await?;
        let ingestor = UploadIngestor::new(paths.clone(), config.max_file_size_bytes());
        let pipeline =
            ConversionPipeline::new(paths.clone(), converter, config.max_concurrent_conversions);

        Ok(Self {
            config: Arc::new(config),
            paths,
            ingestor,
            pipeline,
        })
    }
}
