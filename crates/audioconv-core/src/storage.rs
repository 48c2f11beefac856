//! Filesystem roots for in-flight uploads and finished artifacts.

use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::error::ConvertError;

/// The two storage roots, resolved once at startup.
///
/// Both paths are canonical, so containment checks against
/// [`StoragePaths::output_root`] compare like with like.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    scratch_root: PathBuf,
    output_root: PathBuf,
}

impl StoragePaths {
    /// Create both roots if absent and canonicalize them.
    pub async fn prepare(
        scratch_root: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
    ) -> Result<Self, ConvertError> {
        let scratch_root = ensure_dir(scratch_root.as_ref()).await?;
        let output_root = ensure_dir(output_root.as_ref()).await?;
        info!(
            scratch_root = %scratch_root.display(),
            output_root = %output_root.display(),
            "storage roots ready"
        );
        Ok(Self { scratch_root, output_root })
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Fresh scratch path: `{uuid}_input[.ext]`.
    pub fn scratch_path(&self, extension: Option<&str>) -> PathBuf {
        let token = Uuid::new_v4();
        let name = match extension {
            Some(ext) if !ext.is_empty() => format!("{token}_input.{ext}"),
            _ => format!("{token}_input"),
        };
        self.scratch_root.join(name)
    }
}

async fn ensure_dir(path: &Path) -> Result<PathBuf, ConvertError> {
    tokio::fs::create_dir_all(path).await?;
    Ok(tokio::fs::canonicalize(path).await?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn prepare_creates_missing_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tmp.path().join("nested/scratch");
        let output = tmp.path().join("nested/output");

        let paths = StoragePaths::prepare(&scratch, &output).await.unwrap();

        assert!(scratch.is_dir());
        assert!(output.is_dir());
        assert!(paths.output_root().is_absolute());
    }

    #[tokio::test]
    async fn prepare_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let a = StoragePaths::prepare(tmp.path().join("s"), tmp.path().join("o")).await.unwrap();
        let b = StoragePaths::prepare(tmp.path().join("s"), tmp.path().join("o")).await.unwrap();
        assert_eq!(a.output_root(), b.output_root());
    }

    #[tokio::test]
    async fn scratch_paths_are_unique_and_keep_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StoragePaths::prepare(tmp.path().join("s"), tmp.path().join("o")).await.unwrap();

        let a = paths.scratch_path(Some("wav"));
        let b = paths.scratch_path(Some("wav"));
        assert_ne!(a, b);
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("wav"));
        assert!(a.starts_with(paths.scratch_root()));
        assert!(paths.scratch_path(None).extension().is_none());
    }
}
