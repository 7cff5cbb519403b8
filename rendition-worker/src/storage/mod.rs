//! Storage collaborators: source download and rendition upload.

mod http;
mod local;
pub mod multipart;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::value_objects::Target;
use crate::domain::{Rendition, Source};
use crate::utils::data_uri;
use crate::utils::fs::ensure_parent_dir;
use crate::{Error, Result};

/// Moves bytes in and out of the working directory.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Materialize `source.url` at `source.path` and return the local path.
    async fn download(&self, source: &Source) -> Result<PathBuf>;

    /// Upload `rendition.path()` to the rendition's target.
    async fn upload(&self, rendition: &Rendition) -> Result<()>;
}

/// Handles `data:` URIs, local files (`file://` or absolute paths) and HTTP(S).
#[derive(Debug, Clone)]
pub struct DefaultStorage {
    http: reqwest::Client,
}

impl DefaultStorage {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Build with a dedicated HTTP client using `timeout` per request.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::new(http))
    }
}

#[async_trait]
impl StorageClient for DefaultStorage {
    async fn download(&self, source: &Source) -> Result<PathBuf> {
        let url = source.url.trim();
        let destination = source.path();
        ensure_parent_dir(destination).await?;

        if data_uri::is_data_uri(url) {
            let (_, bytes) = data_uri::decode(url)?;
            tokio::fs::write(destination, &bytes)
                .await
                .map_err(|e| Error::io_path("writing", destination, e))?;
            debug!(size = bytes.len(), "Decoded data uri source");
        } else if http::is_http(url) {
            http::download(&self.http, url, destination).await?;
        } else if let Some(path) = local::local_path(url) {
            local::copy(&path, destination).await?;
        } else {
            return Err(Error::SourceUnsupported(format!(
                "unsupported source location: {}",
                source.display_url()
            )));
        }

        info!(source = %source.display_url(), path = %destination.display(), "Source downloaded");
        Ok(destination.to_path_buf())
    }

    async fn upload(&self, rendition: &Rendition) -> Result<()> {
        let Some(target) = rendition.target() else {
            return Err(Error::validation(format!(
                "rendition {} has no target",
                rendition.name()
            )));
        };

        match target {
            Target::Url(url) if http::is_http(url) => {
                http::put_file(&self.http, url, rendition.path()).await?
            }
            Target::Url(url) => {
                let Some(path) = local::local_path(url) else {
                    return Err(Error::validation(format!("unsupported target: {}", url)));
                };
                local::copy(rendition.path(), &path).await?;
            }
            Target::MultiPart(multi) => {
                let size = crate::utils::fs::file_size(rendition.path()).await?;
                let parts = multipart::plan_parts(size, multi)?;
                for part in &parts {
                    http::put_range(&self.http, &part.url, rendition.path(), part.offset, part.len)
                        .await?;
                }
                debug!(rendition = %rendition.name(), parts = parts.len(), "Multi-part upload complete");
            }
        }

        info!(rendition = %rendition.name(), "Rendition uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::RenditionInstructions;
    use tempfile::TempDir;

    fn source(url: &str, dir: &TempDir) -> Source {
        Source {
            name: "source.bin".into(),
            path: dir.path().join("in/source.bin"),
            mime_type: None,
            url: url.to_string(),
            downloaded: true,
        }
    }

    fn storage() -> DefaultStorage {
        DefaultStorage::new(reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_download_data_uri() {
        let temp = TempDir::new().unwrap();
        let path = storage()
            .download(&source("data:text/plain;base64,aGVsbG8=", &temp))
            .await
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_download_local_file_and_missing_file() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin.bin");
        std::fs::write(&origin, b"abc").unwrap();

        let url = format!("file://{}", origin.display());
        let path = storage().download(&source(&url, &temp)).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"abc");

        let missing = temp.path().join("nope.bin");
        let err = storage()
            .download(&source(missing.to_str().unwrap(), &temp))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), crate::error::ErrorReason::GenericError);
    }

    #[tokio::test]
    async fn test_download_unsupported_scheme() {
        let temp = TempDir::new().unwrap();
        let err = storage()
            .download(&source("ftp://example.com/a.png", &temp))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), crate::error::ErrorReason::SourceUnsupported);
    }

    #[tokio::test]
    async fn test_upload_to_local_target() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let dest = temp.path().join("uploaded/r.png");

        let instructions = RenditionInstructions {
            target: Some(Target::Url(dest.display().to_string())),
            ..RenditionInstructions::for_format("png")
        };
        let rendition = Rendition::new(instructions, &out, 0);
        std::fs::write(rendition.path(), b"pixels").unwrap();

        storage().upload(&rendition).await.unwrap();
        assert_eq!(std::fs::read(dest).unwrap(), b"pixels");
    }
}
