//! Streaming upload ingestion into scratch storage.
//!
//! Uploads are never held in memory as a whole: the byte stream is written
//! through a [`CHUNK_SIZE`] buffer and the running total is checked after
//! every chunk, so an oversized upload is cut off as soon as it crosses the
//! limit rather than after it has been fully received.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::error::ConvertError;
use crate::storage::StoragePaths;

/// Write granularity towards scratch storage.
pub const CHUNK_SIZE: usize = 1024 * 1024;

const MAX_EXTENSION_LEN: usize = 16;

/// A temporary upload owned by exactly one in-flight request.
///
/// The file is removed when the guard is dropped, on every exit path
/// including early returns, panics and cancelled futures. Call
/// [`ScratchFile::discard`] to remove it eagerly.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    size: u64,
    armed: bool,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path, size: 0, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written by the ingestor.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the file now instead of at drop time.
    pub async fn discard(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "scratch file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "scratch file removed on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

/// Streams uploads into [`ScratchFile`]s under a size limit.
#[derive(Debug, Clone)]
pub struct UploadIngestor {
    paths: StoragePaths,
    max_bytes: u64,
}

impl UploadIngestor {
    pub fn new(paths: StoragePaths, max_bytes: u64) -> Self {
        Self { paths, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Write `stream` to a fresh scratch file.
    ///
    /// Fails with [`ConvertError::PayloadTooLarge`] once more than
    /// `max_bytes` have arrived, and with [`ConvertError::InvalidInput`] when
    /// the transport errors or the result is empty. The partial file is gone
    /// by the time any error is returned.
    pub async fn ingest<S, E>(
        &self,
        filename: Option<&str>,
        stream: S,
    ) -> Result<ScratchFile, ConvertError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut stream = std::pin::pin!(stream);
        let extension = filename.and_then(scratch_extension);
        let mut scratch = ScratchFile::new(self.paths.scratch_path(extension.as_deref()));

        let file = tokio::fs::File::create(&scratch.path).await?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                warn!(error = %e, "upload stream failed");
                ConvertError::InvalidInput(format!("upload interrupted: {e}"))
            })?;

            written += chunk.len() as u64;
            if written > self.max_bytes {
                drop(writer);
                warn!(
                    received_bytes = written,
                    max_bytes = self.max_bytes,
                    "upload exceeds size limit; aborting"
                );
                return Err(ConvertError::PayloadTooLarge {
                    limit_mb: self.max_bytes / (1024 * 1024),
                });
            }
            writer.write_all(&chunk).await?;
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        let size = match tokio::fs::metadata(&scratch.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Err(ConvertError::InvalidInput("empty or corrupted upload".into()));
        }
        scratch.size = size;

        info!(
            path = %scratch.path.display(),
            original_name = filename.unwrap_or(""),
            size_bytes = size,
            "upload stored in scratch"
        );
        Ok(scratch)
    }
}

/// Extension of the client filename, reduced to a short alphanumeric token.
fn scratch_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    let cleaned: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
