//! Resolved source asset.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// The source asset of an activation, bound to the local working directory.
///
/// Created once by the source preparer and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Derived file name (`source.<ext>`).
    pub name: String,
    /// Local filesystem location. Equals the URL when download is disabled.
    pub path: PathBuf,
    /// Mime type, declared or inferred.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Original location of the source.
    pub url: String,
    /// False when the source was passed through without downloading.
    pub downloaded: bool,
}

impl Source {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension of the derived name, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }

    /// URL safe to show in logs and results: data URIs are reduced to their header.
    pub fn display_url(&self) -> String {
        if self.url.starts_with("data:") {
            let header = self.url.split(',').next().unwrap_or("data:");
            format!("{},...", header)
        } else {
            self.url.clone()
        }
    }
}
