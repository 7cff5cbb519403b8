//! Pixel helpers shared by the reference transform and post-processor.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use media_types::MediaFormat;

use crate::{Error, Result};

/// Default JPEG quality when none was requested.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Encoder format for a media format the `image` crate can write.
pub fn encoder_format(format: MediaFormat) -> Option<ImageFormat> {
    match format {
        MediaFormat::Tiff => Some(ImageFormat::Tiff),
        MediaFormat::Png => Some(ImageFormat::Png),
        MediaFormat::Jpeg => Some(ImageFormat::Jpeg),
        MediaFormat::Gif => Some(ImageFormat::Gif),
        MediaFormat::Bmp => Some(ImageFormat::Bmp),
        MediaFormat::Webp => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Decode an image and apply its EXIF orientation.
///
/// An undecodable file of a recognised format is corrupt; a file whose format
/// cannot be recognised at all is unsupported.
pub fn decode_oriented(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| Error::io_path("opening image", path, e))?;
    let Some(format) = reader.format() else {
        return Err(Error::SourceUnsupported(format!(
            "unrecognised image format: {}",
            path.display()
        )));
    };

    let corrupt = |e: image::ImageError| Error::SourceCorrupt(format!("{:?} decode failed: {}", format, e));
    let mut decoder = reader.into_decoder().map_err(corrupt)?;
    let orientation = decoder.orientation().map_err(corrupt)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(corrupt)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Resize to the requested box. With a single axis the other one keeps the
/// aspect ratio.
pub fn resize_to(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    let (w0, h0) = (img.width().max(1), img.height().max(1));
    let (w, h) = match (width, height) {
        (None, None) => return img,
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale_axis(h0, w, w0)),
        (None, Some(h)) => (scale_axis(w0, h, h0), h),
    };
    if (w, h) == (img.width(), img.height()) || w == 0 || h == 0 {
        return img;
    }
    img.resize_exact(w, h, FilterType::Lanczos3)
}

fn scale_axis(other: u32, requested: u32, original: u32) -> u32 {
    let scaled = f64::from(other) * f64::from(requested) / f64::from(original);
    (scaled.round() as u32).max(1)
}

/// Encode into memory. JPEG drops alpha and honours `quality`.
pub fn encode(img: &DynamicImage, format: MediaFormat, quality: Option<u8>) -> Result<Vec<u8>> {
    let Some(image_format) = encoder_format(format) else {
        return Err(Error::RenditionFormatUnsupported(format!(
            "cannot encode {}",
            format.file_type()
        )));
    };

    let mut buf = Vec::new();
    match image_format {
        ImageFormat::Jpeg => {
            let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
                .encode_image(&img.to_rgb8())?;
        }
        ImageFormat::WebP | ImageFormat::Gif => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut Cursor::new(&mut buf), image_format)?;
        }
        _ => img.write_to(&mut Cursor::new(&mut buf), image_format)?,
    }
    Ok(buf)
}

/// Parse `#rgb`, `#rrggbb` or one of a few color names.
pub fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let value = value.trim().to_ascii_lowercase();
    let named = match value.as_str() {
        "white" => Some([255, 255, 255]),
        "black" => Some([0, 0, 0]),
        "red" => Some([255, 0, 0]),
        "green" => Some([0, 128, 0]),
        "blue" => Some([0, 0, 255]),
        "gray" | "grey" => Some([128, 128, 128]),
        _ => None,
    };
    if let Some([r, g, b]) = named {
        return Some(Rgba([r, g, b, 255]));
    }

    let hex = value.strip_prefix('#').filter(|h| h.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 => Some(Rgba([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ])),
        _ => None,
    }
}

/// Composite the image onto an opaque background.
pub fn flatten(img: &DynamicImage, background: Rgba<u8>) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(img.width(), img.height(), background);
    image::imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
}
