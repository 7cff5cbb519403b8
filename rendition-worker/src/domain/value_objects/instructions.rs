//! Rendition instruction value object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::target::Target;

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Resolution request, either uniform or per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dpi {
    Uniform(f64),
    PerAxis { xdpi: f64, ydpi: f64 },
}

impl Dpi {
    pub fn xy(&self) -> (f64, f64) {
        match *self {
            Self::Uniform(dpi) => (dpi, dpi),
            Self::PerAxis { xdpi, ydpi } => (xdpi, ydpi),
        }
    }
}

/// Watermark overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    /// Location of the watermark image (URL, data URI or local path).
    pub image: String,
    /// Watermark width relative to the rendition width (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

/// Caller-declared transform parameters for one rendition.
///
/// Unknown keys are kept in `extra` so they round-trip into outcome events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenditionInstructions {
    /// Output format token (`png`, `jpg`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmt: Option<String>,

    /// Upload destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    /// Explicit output file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Encoder quality (1 - 100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<Dpi>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_to_dpi: Option<Dpi>,

    /// Upper bound for the JPEG file size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jpeg_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interlace: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,

    /// Background color used to flatten transparency (`#rrggbb` or a color name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdfbgcolor: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RenditionInstructions {
    /// Instructions for the given format with everything else unset.
    pub fn for_format(fmt: impl Into<String>) -> Self {
        Self {
            fmt: Some(fmt.into()),
            ..Default::default()
        }
    }

    /// The instructions as JSON with the upload target stripped.
    pub fn redacted(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()));
        if let Value::Object(ref mut map) = value {
            map.remove("target");
        }
        value
    }
}
