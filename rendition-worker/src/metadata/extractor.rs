//! Rendition metadata extraction.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::domain::RenditionMetadata;
use crate::utils::fs::file_size;

const HASH_BUFFER: usize = 64 * 1024;

/// Computes size, content hash and pixel dimensions of a file.
///
/// Nothing here fails the rendition: whatever cannot be determined is left out.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub async fn extract(&self, path: &Path) -> RenditionMetadata {
        let size = match file_size(path).await {
            Ok(size) => Some(size),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read rendition size");
                None
            }
        };

        let sha256 = match sha256_file(path).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not hash rendition");
                None
            }
        };

        let (width, height) = match dimensions(path).await {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };

        RenditionMetadata {
            size,
            sha256,
            width,
            height,
        }
    }
}

async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUFFER];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

async fn dimensions(path: &Path) -> Option<(u32, u32)> {
    let owned: PathBuf = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || image::image_dimensions(&owned))
        .await
        .ok()?;
    match result {
        Ok(dims) => Some(dims),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No pixel dimensions");
            None
        }
    }
}
