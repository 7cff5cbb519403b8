//! `data:` URI parsing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{Error, Result};

/// Parsed header of a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUriHeader {
    /// Mime type, `text/plain` when omitted.
    pub mime_type: String,
    pub base64: bool,
}

pub fn is_data_uri(url: &str) -> bool {
    url.get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Parse the part between `data:` and the first comma.
pub fn parse_header(url: &str) -> Result<DataUriHeader> {
    if !is_data_uri(url) {
        return Err(Error::SourceUnsupported("not a data uri".to_string()));
    }
    let Some((header, _)) = url[5..].split_once(',') else {
        return Err(Error::SourceCorrupt("data uri has no payload separator".to_string()));
    };

    let mut parts = header.split(';');
    let mime_type = parts
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_ascii_lowercase();
    let base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    Ok(DataUriHeader { mime_type, base64 })
}

/// Decode the payload of a data URI.
///
/// Malformed base64 is a corrupt source.
pub fn decode(url: &str) -> Result<(DataUriHeader, Vec<u8>)> {
    let header = parse_header(url)?;
    let payload = url
        .split_once(',')
        .map(|(_, payload)| payload)
        .unwrap_or_default();

    let bytes = if header.base64 {
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| Error::SourceCorrupt(format!("invalid base64 in data uri: {}", e)))?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok((header, bytes))
}
