//! Local filesystem locations.

use std::path::{Path, PathBuf};

use crate::utils::fs::ensure_parent_dir;
use crate::{Error, Result};

/// Resolve `file://` URLs and absolute paths.
pub fn local_path(location: &str) -> Option<PathBuf> {
    if location.starts_with("file:") {
        return url::Url::parse(location).ok()?.to_file_path().ok();
    }
    let path = Path::new(location);
    path.is_absolute().then(|| path.to_path_buf())
}

/// Copy `from` to `to`, creating the parent directory of `to`.
pub async fn copy(from: &Path, to: &Path) -> Result<u64> {
    ensure_parent_dir(to).await?;
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| Error::io_path("copying", from, e))
}
