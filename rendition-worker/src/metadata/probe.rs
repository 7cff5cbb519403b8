//! Intermediate file probing.

use std::io::Read;
use std::path::{Path, PathBuf};

use image::{ImageDecoder, ImageFormat, ImageReader};
use media_types::{MediaFormat, Orientation, Resolution};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::jpeg;
use crate::{Error, Result};

const SNIFF_LEN: usize = 1024;

/// What the probe learned about a generated file.
///
/// Field names follow the usual metadata tool output (`FileType`, `ImageWidth`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntermediateMetadata {
    /// Upper-case type token, `None` when the type could not be determined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    /// EXIF orientation value (1 - 8).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u16>,
    /// Estimated encoder quality (JPEG only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

impl IntermediateMetadata {
    pub fn format(&self) -> Option<MediaFormat> {
        self.file_type.as_deref().and_then(MediaFormat::from_token)
    }

    pub fn resolution(&self) -> Option<Resolution> {
        Some(Resolution::new(self.image_width?, self.image_height?))
    }

    /// Orientation tag, `Normal` when absent or out of range.
    pub fn orientation(&self) -> Orientation {
        self.orientation
            .and_then(Orientation::from_exif)
            .unwrap_or_default()
    }
}

/// Probe a generated file.
///
/// Only a missing or unreadable file is an error. An unrecognised format
/// comes back with `file_type: None`.
pub async fn probe(path: &Path) -> Result<IntermediateMetadata> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || probe_sync(&owned))
        .await
        .map_err(|e| Error::Other(format!("probe task failed: {}", e)))?
}

fn probe_sync(path: &Path) -> Result<IntermediateMetadata> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    std::fs::File::open(path)
        .and_then(|f| f.take(SNIFF_LEN as u64).read_to_end(&mut head))
        .map_err(|e| Error::io_path("probing", path, e))?;

    if looks_like_svg(&head) {
        let (image_width, image_height) = svg_dimensions(&String::from_utf8_lossy(&head)).unzip();
        return Ok(IntermediateMetadata {
            file_type: Some(MediaFormat::Svg.file_type().to_string()),
            image_width,
            image_height,
            ..Default::default()
        });
    }

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| Error::io_path("probing", path, e))?;
    let Some(format) = reader.format() else {
        debug!(path = %path.display(), "Probe could not determine file type");
        return Ok(IntermediateMetadata::default());
    };

    let mut decoder = match reader.into_decoder() {
        Ok(decoder) => decoder,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Probe could not read image header");
            return Ok(IntermediateMetadata::default());
        }
    };

    let (width, height) = decoder.dimensions();
    let orientation = decoder
        .orientation()
        .ok()
        .map(|o| u16::from(o.to_exif()));
    let quality = if format == ImageFormat::Jpeg {
        std::fs::read(path)
            .ok()
            .and_then(|bytes| jpeg::estimate_quality(&bytes))
    } else {
        None
    };

    Ok(IntermediateMetadata {
        file_type: Some(file_type_token(format)),
        image_width: Some(width),
        image_height: Some(height),
        orientation,
        quality,
    })
}

fn file_type_token(format: ImageFormat) -> String {
    let ext = format.extensions_str().first().copied().unwrap_or_default();
    match MediaFormat::from_token(ext) {
        Some(known) => known.file_type().to_string(),
        None => ext.to_ascii_uppercase(),
    }
}

fn looks_like_svg(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    (text.starts_with("<svg") || text.starts_with("<?xml") || text.starts_with("<!DOCTYPE svg"))
        && text.contains("<svg")
}

/// Pixel size of the root `<svg>` element: its `width`/`height` attributes,
/// else the size of its `viewBox`.
fn svg_dimensions(text: &str) -> Option<(u32, u32)> {
    let start = text.find("<svg")?;
    let tag = &text[start..];
    let tag = &tag[..tag.find('>').unwrap_or(tag.len())];

    let sized = svg_attribute(tag, "width")
        .and_then(svg_length)
        .zip(svg_attribute(tag, "height").and_then(svg_length));
    sized.or_else(|| {
        let view_box = svg_attribute(tag, "viewBox")?;
        let parts: Vec<f64> = view_box
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [_, _, w, h] => Some((to_pixels(*w)?, to_pixels(*h)?)),
            _ => None,
        }
    })
}

fn svg_attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut offset = 0;
    while let Some(found) = tag[offset..].find(name) {
        let at = offset + found;
        offset = at + name.len();
        // Skip e.g. `stroke-width`.
        if !tag[..at].ends_with(char::is_whitespace) {
            continue;
        }
        let rest = tag[offset..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value = &rest[1..];
        return value.find(quote).map(|end| &value[..end]);
    }
    None
}

/// Unitless or `px` lengths only; relative units have no intrinsic size.
fn svg_length(value: &str) -> Option<u32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim_end();
    to_pixels(number.parse().ok()?)
}

fn to_pixels(value: f64) -> Option<u32> {
    (1.0..=u32::MAX as f64).contains(&value).then(|| value.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_probe_png() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.png");
        image::RgbaImage::new(7, 5).save(&path).unwrap();

        let metadata = probe(&path).await.unwrap();
        assert_eq!(metadata.file_type.as_deref(), Some("PNG"));
        assert_eq!(metadata.format(), Some(MediaFormat::Png));
        assert_eq!(metadata.resolution(), Some(Resolution::new(7, 5)));
        assert_eq!(metadata.orientation(), Orientation::Normal);
        assert_eq!(metadata.quality, None);
    }

    #[tokio::test]
    async fn test_probe_svg_and_garbage() {
        let temp = TempDir::new().unwrap();
        let svg = temp.path().join("a.svg");
        std::fs::write(&svg, r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"/>"#).unwrap();
        let metadata = probe(&svg).await.unwrap();
        assert_eq!(metadata.format(), Some(MediaFormat::Svg));
        assert_eq!(metadata.resolution(), None);

        let junk = temp.path().join("junk.bin");
        std::fs::write(&junk, b"definitely not an image").unwrap();
        assert_eq!(probe(&junk).await.unwrap().file_type, None);
    }

    #[tokio::test]
    async fn test_probe_svg_dimensions() {
        let temp = TempDir::new().unwrap();
        let svg = temp.path().join("sized.svg");
        std::fs::write(
            &svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" stroke-width="3" width="100px" height='50'></svg>"#,
        )
        .unwrap();
        let metadata = probe(&svg).await.unwrap();
        assert_eq!(metadata.file_type.as_deref(), Some("SVG"));
        assert_eq!((metadata.image_width, metadata.image_height), (Some(100), Some(50)));
    }

    #[test]
    fn test_svg_dimensions_fall_back_to_view_box() {
        assert_eq!(
            svg_dimensions(r#"<svg viewBox="0 0 640 480" width="100%"><rect width="5"/></svg>"#),
            Some((640, 480))
        );
        assert_eq!(svg_dimensions(r#"<svg viewBox="0,0,24.4,12"/>"#), Some((24, 12)));
        assert_eq!(svg_dimensions(r#"<svg width="10em" height="2em"/>"#), None);
        assert_eq!(svg_dimensions("<svg>"), None);
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(probe(&temp.path().join("missing.png")).await.is_err());
    }

    #[test]
    fn test_deserialize_probe_fields() {
        let metadata: IntermediateMetadata =
            serde_json::from_str(r#"{"FileType": "JPEG", "ImageWidth": 10, "ImageHeight": 20, "Orientation": 6}"#)
                .unwrap();
        assert_eq!(metadata.format(), Some(MediaFormat::Jpeg));
        assert_eq!(metadata.orientation(), Orientation::Rotate90);
    }
}
