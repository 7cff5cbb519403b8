//! Upload target value object.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Multi-part upload descriptor: the file is split across `urls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPartTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_part_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_part_size: Option<u64>,
    pub urls: Vec<String>,
}

/// Where a rendition is uploaded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Url(String),
    MultiPart(MultiPartTarget),
}

impl Target {
    /// Check that the target is usable before a rendition is accepted.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Url(url) => validate_location(url),
            Self::MultiPart(multi) => {
                if multi.urls.is_empty() {
                    return Err(Error::validation("multi-part target has no urls"));
                }
                for url in &multi.urls {
                    validate_location(url)?;
                }
                if let (Some(min), Some(max)) = (multi.min_part_size, multi.max_part_size)
                    && min > max
                {
                    return Err(Error::validation(format!(
                        "multi-part target minPartSize {} exceeds maxPartSize {}",
                        min, max
                    )));
                }
                if multi.max_part_size == Some(0) {
                    return Err(Error::validation("multi-part target maxPartSize is zero"));
                }
                Ok(())
            }
        }
    }
}

/// A location is an absolute URL or an absolute local path.
fn validate_location(location: &str) -> Result<()> {
    let location = location.trim();
    if location.is_empty() {
        return Err(Error::validation("rendition target is empty"));
    }
    if location.starts_with('/') {
        return Ok(());
    }
    match url::Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => Ok(()),
        Ok(url) => Err(Error::validation(format!(
            "rendition target scheme '{}' is not supported",
            url.scheme()
        ))),
        Err(e) => Err(Error::validation(format!(
            "rendition target is not a valid url: {}",
            e
        ))),
    }
}
