//! Output artifact naming, commit/rollback and retrieval resolution.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConvertError;
use crate::format::{TargetFormat, media_type_for_path};
use crate::storage::StoragePaths;

const DEFAULT_STEM: &str = "audio";

/// Keeps `{stem}_{uuid}.{ext}` well below the usual 255-byte name limit.
pub const MAX_STEM_LEN: usize = 128;

const MAX_NAME_LEN: usize = 255;

/// A finished, durable conversion result on the output root.
///
/// Named `{stem}_{uuid}.{ext}`; the token makes names unique even for
/// concurrent uploads of identically named files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    file_name: String,
    path: PathBuf,
    format: TargetFormat,
}

impl OutputArtifact {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }
}

/// An artifact whose conversion has not succeeded yet.
///
/// Dropping it without [`PendingArtifact::commit`] deletes whatever the
/// converter left at the output path.
#[derive(Debug)]
pub struct PendingArtifact {
    artifact: OutputArtifact,
    committed: bool,
}

impl PendingArtifact {
    /// Reserve a unique output name for `source_filename` in `format`.
    pub fn allocate(
        paths: &StoragePaths,
        source_filename: Option<&str>,
        format: TargetFormat,
    ) -> Self {
        let stem = source_filename.map(sanitize_stem).unwrap_or_else(|| DEFAULT_STEM.to_owned());
        let file_name = format!("{stem}_{}.{}", Uuid::new_v4(), format.extension());
        let path = paths.output_root().join(&file_name);
        Self {
            artifact: OutputArtifact { file_name, path, format },
            committed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.artifact.path
    }

    pub fn artifact(&self) -> &OutputArtifact {
        &self.artifact
    }

    /// Keep the output file; it will no longer be removed on drop.
    pub fn commit(mut self) -> OutputArtifact {
        self.committed = true;
        self.artifact.clone()
    }
}

impl Drop for PendingArtifact {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let path = &self.artifact.path;
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "partial output removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial output"),
        }
    }
}

/// File stem of the client filename, restricted to `[A-Za-z0-9._-]`.
pub fn sanitize_stem(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let mut cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return DEFAULT_STEM.to_owned();
    }
    // ASCII only at this point, so any byte index is a char boundary.
    cleaned.truncate(MAX_STEM_LEN);
    cleaned
}

/// Errors meaning "there is no such file" rather than an I/O fault.
fn unresolvable(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidInput
    )
}

/// A dangling or looping link fails to canonicalize but still exists.
async fn is_symlink(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// A stored artifact located for download.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: &'static str,
    pub size: u64,
}

/// Locate `filename` under the output root.
///
/// Names with `..` or root components are refused outright, whether or not
/// the target exists. The candidate is then canonicalized before the
/// containment check, so links pointing outside the root are refused too.
pub async fn resolve_download(
    paths: &StoragePaths,
    filename: &str,
) -> Result<ResolvedArtifact, ConvertError> {
    let escapes = Path::new(filename).components().any(|c| {
        matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        warn!(requested = %filename, "download path escapes output root");
        return Err(ConvertError::AccessDenied);
    }

    let candidate = paths.output_root().join(filename);

    // Longer than any file the filesystem could hold.
    if Path::new(filename).components().any(|c| c.as_os_str().len() > MAX_NAME_LEN) {
        return Err(ConvertError::NotFound(filename.to_owned()));
    }

    let canonical = match tokio::fs::canonicalize(&candidate).await {
        Ok(p) => p,
        Err(e) => {
            if unresolvable(&e) || is_symlink(&candidate).await {
                debug!(requested = %filename, error = %e, "download target does not resolve");
                return Err(ConvertError::NotFound(filename.to_owned()));
            }
            return Err(e.into());
        }
    };

    if !canonical.starts_with(paths.output_root()) {
        warn!(
            requested = %filename,
            resolved = %canonical.display(),
            "download path escapes output root"
        );
        return Err(ConvertError::AccessDenied);
    }

    let meta = tokio::fs::metadata(&canonical).await?;
    if !meta.is_file() {
        return Err(ConvertError::NotFound(filename.to_owned()));
    }

    let file_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename)
        .to_owned();

    Ok(ResolvedArtifact {
        media_type: media_type_for_path(&canonical),
        path: canonical,
        file_name,
        size: meta.len(),
    })
}
