//! Reference transform built on the `image` crate.

use std::path::Path;

use async_trait::async_trait;
use media_types::MediaFormat;
use tracing::debug;

use super::{BatchTransform, PerRenditionTransform};
use crate::domain::{Rendition, Source};
use crate::imaging;
use crate::utils::fs::ensure_parent_dir;
use crate::{Error, Result};

/// Formats the transform writes directly. Everything else goes through an
/// intermediate and post-processing.
const SUPPORTED_FORMATS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg", "gif", "bmp"];

/// Decodes the source, applies orientation and the requested size, and encodes
/// the result. Everything else is left to post-processing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageTransform;

#[async_trait]
impl PerRenditionTransform for ImageTransform {
    async fn transform(&self, source: &Source, rendition: &Rendition) -> Result<()> {
        let format = match rendition.work_format() {
            Some(fmt) => MediaFormat::from_token(&fmt).ok_or_else(|| {
                Error::RenditionFormatUnsupported(format!("unknown format '{}'", fmt))
            })?,
            None => MediaFormat::from_token(source.extension().unwrap_or_default())
                .unwrap_or(MediaFormat::Png),
        };

        let input = source.path().to_path_buf();
        let output = rendition.work_path().to_path_buf();
        let width = rendition.instructions().width;
        let height = rendition.instructions().height;
        let quality = rendition.instructions().quality;
        ensure_parent_dir(&output).await?;

        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let img = imaging::decode_oriented(&input)?;
            let img = imaging::resize_to(img, width, height);
            imaging::encode(&img, format, quality)
        })
        .await
        .map_err(|e| Error::Other(format!("transform task failed: {}", e)))??;

        tokio::fs::write(&output, &bytes)
            .await
            .map_err(|e| Error::io_path("writing", &output, e))?;
        debug!(rendition = %rendition.name(), format = %format, size = bytes.len(), "Transformed");
        Ok(())
    }

    fn supported_formats(&self) -> Option<Vec<String>> {
        Some(SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect())
    }
}

/// [`ImageTransform`] run over every rendition in one call.
///
/// Stops at the first failure; the caller treats the whole batch as failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageBatchTransform;

#[async_trait]
impl BatchTransform for ImageBatchTransform {
    async fn transform(
        &self,
        source: &Source,
        renditions: &[Rendition],
        out_dir: &Path,
    ) -> Result<()> {
        debug!(count = renditions.len(), out_dir = %out_dir.display(), "Batch transform");
        for rendition in renditions {
            ImageTransform.transform(source, rendition).await?;
        }
        Ok(())
    }
}
