//! Reference post-processor built on the `image` crate.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::DynamicImage;
use image::imageops;
use media_types::MediaFormat;
use tracing::{debug, info, warn};

use super::PostProcessor;
use crate::domain::Rendition;
use crate::domain::value_objects::{RenditionInstructions, Watermark};
use crate::imaging::{self, DEFAULT_JPEG_QUALITY};
use crate::metadata::IntermediateMetadata;
use crate::utils::data_uri;
use crate::{Error, Result};

/// Lowest quality tried when fitting a JPEG into `jpegSize`.
const MIN_JPEG_QUALITY: u8 = 10;
const JPEG_QUALITY_STEP: u8 = 5;

/// Applies orientation, crop, resize, background flattening, watermark and
/// encoding. `dpi`, `convertToDpi` and `interlace` are accepted but have no
/// effect on the encoded pixels.
#[derive(Debug, Clone, Default)]
pub struct ImagePostProcessor {
    http: reqwest::Client,
}

impl ImagePostProcessor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch_watermark(&self, watermark: &Watermark) -> Result<Vec<u8>> {
        let location = watermark.image.trim();
        if data_uri::is_data_uri(location) {
            return Ok(data_uri::decode(location)?.1);
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            let response = self.http.get(location).send().await?.error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::io_path("reading watermark", Path::new(path), e))
    }
}

#[async_trait]
impl PostProcessor for ImagePostProcessor {
    async fn post_process(
        &self,
        input: &Path,
        rendition: &Rendition,
        metadata: &IntermediateMetadata,
    ) -> Result<()> {
        let instructions = rendition.instructions().clone();
        let format = match instructions.fmt.as_deref() {
            Some(fmt) => MediaFormat::from_token(fmt),
            None => metadata.format(),
        }
        .ok_or_else(|| {
            Error::RenditionFormatUnsupported(format!(
                "no output format for {}",
                rendition.name()
            ))
        })?;

        let watermark = match &instructions.watermark {
            Some(watermark) => Some(self.fetch_watermark(watermark).await?),
            None => None,
        };

        if instructions.dpi.is_some() || instructions.convert_to_dpi.is_some() {
            debug!(rendition = %rendition.name(), "Resolution metadata is not written by this encoder");
        }
        if instructions.interlace == Some(true) {
            debug!(rendition = %rendition.name(), "Interlaced output is not supported by this encoder");
        }

        let input = input.to_path_buf();
        let name = rendition.name().to_string();
        let bytes = tokio::task::spawn_blocking(move || {
            render(&input, &instructions, format, watermark.as_deref(), &name)
        })
        .await
        .map_err(|e| Error::Other(format!("post-process task failed: {}", e)))??;

        let output = rendition.path();
        let staging = staging_path(output);
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| Error::io_path("writing", &staging, e))?;
        tokio::fs::rename(&staging, output)
            .await
            .map_err(|e| Error::io_path("renaming", &staging, e))?;

        info!(
            rendition = %rendition.name(),
            format = %format,
            size = bytes.len(),
            "Post-processed rendition"
        );
        Ok(())
    }
}

fn staging_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".post");
    output.with_file_name(name)
}

fn render(
    input: &Path,
    instructions: &RenditionInstructions,
    format: MediaFormat,
    watermark: Option<&[u8]>,
    name: &str,
) -> Result<Vec<u8>> {
    let mut img = imaging::decode_oriented(input)?;

    if let Some(crop) = instructions.crop {
        if crop.x >= img.width() || crop.y >= img.height() || crop.w == 0 || crop.h == 0 {
            return Err(Error::validation(format!(
                "crop {}x{}+{}+{} is outside the {}x{} image",
                crop.w,
                crop.h,
                crop.x,
                crop.y,
                img.width(),
                img.height()
            )));
        }
        img = img.crop_imm(crop.x, crop.y, crop.w, crop.h);
    }

    img = imaging::resize_to(img, instructions.width, instructions.height);

    if let Some(color) = instructions.pdfbgcolor.as_deref() {
        let background = imaging::parse_color(color)
            .ok_or_else(|| Error::validation(format!("unknown pdfbgcolor '{}'", color)))?;
        img = imaging::flatten(&img, background);
    }

    if let Some(bytes) = watermark {
        let scale = instructions
            .watermark
            .as_ref()
            .and_then(|w| w.scale)
            .unwrap_or(1.0);
        img = apply_watermark(img, bytes, scale)?;
    }

    match (format, instructions.jpeg_size) {
        (MediaFormat::Jpeg, Some(budget)) => encode_within(&img, budget, instructions.quality, name),
        _ => imaging::encode(&img, format, instructions.quality),
    }
}

/// Overlay the watermark centered, `scale` times the image width.
fn apply_watermark(img: DynamicImage, bytes: &[u8], scale: f64) -> Result<DynamicImage> {
    let mark = image::load_from_memory(bytes)
        .map_err(|e| Error::validation(format!("watermark image cannot be decoded: {}", e)))?;
    let scale = scale.clamp(0.01, 1.0);
    let target_w = ((f64::from(img.width()) * scale).round() as u32).max(1);
    let mark = imaging::resize_to(mark, Some(target_w), None);
    let mark = if mark.height() > img.height() {
        imaging::resize_to(mark, None, Some(img.height().max(1)))
    } else {
        mark
    };

    let x = (i64::from(img.width()) - i64::from(mark.width())) / 2;
    let y = (i64::from(img.height()) - i64::from(mark.height())) / 2;
    let had_alpha = img.color().has_alpha();
    let mut base = img.to_rgba8();
    imageops::overlay(&mut base, &mark.to_rgba8(), x, y);
    let composed = DynamicImage::ImageRgba8(base);
    Ok(if had_alpha {
        composed
    } else {
        DynamicImage::ImageRgb8(composed.to_rgb8())
    })
}

/// Encode a JPEG at decreasing quality until it fits `budget` bytes.
///
/// When even the lowest quality does not fit, the smallest attempt is kept.
fn encode_within(img: &DynamicImage, budget: u64, quality: Option<u8>, name: &str) -> Result<Vec<u8>> {
    let mut quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(MIN_JPEG_QUALITY, 100);
    loop {
        let bytes = imaging::encode(img, MediaFormat::Jpeg, Some(quality))?;
        if bytes.len() as u64 <= budget || quality == MIN_JPEG_QUALITY {
            if bytes.len() as u64 > budget {
                warn!(
                    rendition = %name,
                    budget,
                    size = bytes.len(),
                    "JPEG does not fit the size budget at minimum quality"
                );
            }
            return Ok(bytes);
        }
        quality = quality.saturating_sub(JPEG_QUALITY_STEP).max(MIN_JPEG_QUALITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Crop;
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    async fn run(instructions: RenditionInstructions, temp: &TempDir) -> Result<DynamicImage> {
        let input = temp.path().join("intermediate.png");
        gradient(64, 32).save(&input).unwrap();
        let rendition = Rendition::new(instructions, temp.path(), 0);
        let metadata = crate::metadata::probe(&input).await.unwrap();

        ImagePostProcessor::default()
            .post_process(&input, &rendition, &metadata)
            .await?;
        Ok(image::open(rendition.path()).unwrap())
    }

    #[tokio::test]
    async fn test_crop_then_resize() {
        let temp = TempDir::new().unwrap();
        let instructions = RenditionInstructions {
            crop: Some(Crop { x: 0, y: 0, w: 32, h: 32 }),
            width: Some(16),
            ..RenditionInstructions::for_format("png")
        };
        let out = run(instructions, &temp).await.unwrap();
        assert_eq!((out.width(), out.height()), (16, 16));
    }

    #[tokio::test]
    async fn test_converts_format() {
        let temp = TempDir::new().unwrap();
        let out = run(RenditionInstructions::for_format("jpg"), &temp).await.unwrap();
        assert_eq!((out.width(), out.height()), (64, 32));
        assert!(temp.path().join("rendition0.jpg").exists());
        assert!(!temp.path().join("rendition0.jpg.post").exists());
    }

    #[tokio::test]
    async fn test_crop_outside_image_fails() {
        let temp = TempDir::new().unwrap();
        let instructions = RenditionInstructions {
            crop: Some(Crop { x: 100, y: 0, w: 10, h: 10 }),
            ..RenditionInstructions::for_format("png")
        };
        assert!(run(instructions, &temp).await.is_err());
    }

    #[tokio::test]
    async fn test_watermark_from_data_uri() {
        use base64::Engine;

        let temp = TempDir::new().unwrap();
        let mut mark = Vec::new();
        gradient(8, 8)
            .write_to(&mut std::io::Cursor::new(&mut mark), image::ImageFormat::Png)
            .unwrap();
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&mark)
        );

        let instructions = RenditionInstructions {
            watermark: Some(Watermark {
                image: uri,
                scale: Some(0.25),
            }),
            ..RenditionInstructions::for_format("png")
        };
        let out = run(instructions, &temp).await.unwrap();
        assert_eq!((out.width(), out.height()), (64, 32));
    }

    #[test]
    fn test_jpeg_budget_steps_quality_down() {
        let img = gradient(64, 64);
        let full = imaging::encode(&img, MediaFormat::Jpeg, Some(95)).unwrap();
        let budget = (full.len() as u64) / 2;
        let fitted = encode_within(&img, budget, Some(95), "r").unwrap();
        assert!((fitted.len() as u64) < full.len() as u64);
    }
}
