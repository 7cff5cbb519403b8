//! Mime type and extension lookups.

/// (mime type, canonical extension)
const MIME_TABLE: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/tiff", "tif"),
    ("image/bmp", "bmp"),
    ("image/x-ms-bmp", "bmp"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
    ("image/x-sgi", "sgi"),
    ("image/x-rgb", "rgb"),
    ("image/vnd.adobe.photoshop", "psd"),
    ("image/heic", "heic"),
    ("image/avif", "avif"),
    ("application/pdf", "pdf"),
    ("application/postscript", "eps"),
    ("application/json", "json"),
    ("application/zip", "zip"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/csv", "csv"),
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
    ("audio/mpeg", "mp3"),
];

/// Extension for a mime type. Parameters such as `; charset=` are ignored.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(m, _)| *m == essence)
        .map(|(_, ext)| *ext)
}

/// Mime type for an extension (with or without the leading dot).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    let ext = match ext.as_str() {
        "jpeg" | "jpe" => "jpg",
        "tiff" => "tif",
        other => other,
    };
    MIME_TABLE
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(m, _)| *m)
}
