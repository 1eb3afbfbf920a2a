//! Per-call scratch directories for sandboxed executions.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::PixelforgeResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A uniquely-named directory holding the staged files of one sandbox call.
///
/// Cleanup is explicit rather than drop-based so every exit path of an
/// execution (success, non-zero exit, timeout, spawn failure) runs it at a
/// known point, and so a cleanup failure can be logged without masking the
/// primary error being reported to the caller.
pub(crate) struct ScratchDir {
    path: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ScratchDir {
    /// Creates a fresh scratch directory under `root`.
    pub(crate) async fn create(root: &Path) -> PixelforgeResult<Self> {
        let path = root.join(format!("run-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).await?;

        Ok(Self { path })
    }

    /// The scratch directory path.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the scratch directory and everything in it.
    ///
    /// Failures are logged and swallowed; they must never mask the outcome of
    /// the execution itself.
    pub(crate) async fn cleanup(self) {
        if let Err(e) = fs::remove_dir_all(&self.path).await {
            tracing::warn!(
                path = %self.path.display(),
                "failed to remove sandbox scratch directory: {}",
                e
            );
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scratch_dirs_are_unique_and_removed() {
        let root = tempfile::tempdir().unwrap();

        let first = ScratchDir::create(root.path()).await.unwrap();
        let second = ScratchDir::create(root.path()).await.unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().is_dir());

        let first_path = first.path().to_path_buf();
        first.cleanup().await;
        second.cleanup().await;
        assert!(!first_path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
