//! Filesystem helpers shared across modules.
//!
//! These helpers attach the operation and path to IO errors so a failure in the
//! working directory is traceable from the rendition error alone.

use std::path::Path;

use crate::{Error, Result};

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_path("creating directory", path, e))
}

/// Ensure the parent directory of a file path exists.
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    ensure_dir_all(parent).await
}

/// Whether `path` exists and is a regular file.
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Size of a file in bytes.
pub async fn file_size(path: &Path) -> Result<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|e| Error::io_path("reading metadata of", path, e))
}

/// Recursively remove a directory.
///
/// A directory that is already gone counts as removed, so calling this twice
/// succeeds both times.
pub async fn remove_dir_all(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_dir_all_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("activation/out");
        ensure_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("r.png"), b"x").await.unwrap();

        let root = temp.path().join("activation");
        remove_dir_all(&root).await.unwrap();
        assert!(!root.exists());
        remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_helpers() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("nested/a.bin");
        ensure_parent_dir(&file).await.unwrap();
        tokio::fs::write(&file, [0u8; 12]).await.unwrap();

        assert!(is_file(&file).await);
        assert!(!is_file(temp.path()).await);
        assert_eq!(file_size(&file).await.unwrap(), 12);
        assert!(file_size(&temp.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_dir_all_names_the_path() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        tokio::fs::write(&blocker, b"x").await.unwrap();

        let err = ensure_dir_all(&blocker.join("out")).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("creating directory"), "{message}");
        assert!(message.contains("blocker"), "{message}");
    }
}
