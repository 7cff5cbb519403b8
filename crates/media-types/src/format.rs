//! Format tokens as they appear in rendition instructions and probe results.

/// Image formats the rendition pipeline knows how to reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFormat {
    Tiff,
    Png,
    Jpeg,
    Gif,
    Bmp,
    Svg,
    Sgi,
    Rgba,
    Rgb,
    Webp,
}

/// Intermediate formats in the order they are preferred when a worker cannot
/// emit the requested output format directly.
pub const INTERMEDIATE_PRIORITY: [MediaFormat; 9] = [
    MediaFormat::Tiff,
    MediaFormat::Png,
    MediaFormat::Jpeg,
    MediaFormat::Gif,
    MediaFormat::Bmp,
    MediaFormat::Svg,
    MediaFormat::Sgi,
    MediaFormat::Rgba,
    MediaFormat::Rgb,
];

impl MediaFormat {
    /// Parse an instruction `fmt` token or a probed file type (case-insensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().trim_start_matches('.').to_ascii_lowercase();
        let format = match token.as_str() {
            "tif" | "tiff" => Self::Tiff,
            "png" => Self::Png,
            "jpg" | "jpeg" | "jpe" => Self::Jpeg,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "svg" => Self::Svg,
            "sgi" => Self::Sgi,
            "rgba" => Self::Rgba,
            "rgb" => Self::Rgb,
            "webp" => Self::Webp,
            _ => return None,
        };
        Some(format)
    }

    /// File extension used when naming files of this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Tiff => "tif",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Svg => "svg",
            Self::Sgi => "sgi",
            Self::Rgba => "rgba",
            Self::Rgb => "rgb",
            Self::Webp => "webp",
        }
    }

    /// Upper-case file type token as reported by a metadata probe.
    pub fn file_type(self) -> &'static str {
        match self {
            Self::Tiff => "TIFF",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Svg => "SVG",
            Self::Sgi => "SGI",
            Self::Rgba => "RGBA",
            Self::Rgb => "RGB",
            Self::Webp => "WEBP",
        }
    }

    /// Whether post-processing can read a file of this format: every
    /// intermediate format plus WebP.
    pub fn is_post_process_readable(self) -> bool {
        self == Self::Webp || INTERMEDIATE_PRIORITY.contains(&self)
    }

    /// Whether post-processing can produce a file of this format.
    pub fn is_post_process_writable(self) -> bool {
        matches!(
            self,
            Self::Tiff | Self::Png | Self::Jpeg | Self::Gif | Self::Bmp | Self::Webp
        )
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Compare two format tokens, honouring aliases such as `jpg`/`jpeg`.
///
/// Unknown tokens fall back to a case-insensitive string comparison.
pub fn same_format(a: &str, b: &str) -> bool {
    match (MediaFormat::from_token(a), MediaFormat::from_token(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

/// Pick the highest-priority intermediate format among `supported` tokens.
pub fn select_intermediate<S: AsRef<str>>(supported: &[S]) -> Option<MediaFormat> {
    INTERMEDIATE_PRIORITY.iter().copied().find(|candidate| {
        supported
            .iter()
            .any(|token| MediaFormat::from_token(token.as_ref()) == Some(*candidate))
    })
}
