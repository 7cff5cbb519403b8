//! Work request: the input to one activation.

use serde::{Deserialize, Serialize};

use super::value_objects::RenditionInstructions;

/// Source reference as supplied by the caller.
///
/// Either a bare URL string or an object with an optional name and mime hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceDescriptor {
    Url(String),
    Object {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "mimeType")]
        mime_type: Option<String>,
    },
}

impl SourceDescriptor {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url.as_str()),
            Self::Object { url, .. } => url.as_deref(),
        }
        .map(str::trim)
        .filter(|url| !url.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Url(_) => None,
            Self::Object { name, .. } => name.as_deref().filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Url(_) => None,
            Self::Object { mime_type, .. } => {
                mime_type.as_deref().filter(|m| !m.trim().is_empty())
            }
        }
    }
}

/// Caller options that change how the activation runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestOptions {
    /// Pass the source URL through instead of downloading it.
    pub disable_source_download: bool,
    /// Skip uploads; renditions are not required to exist on disk.
    pub disable_rendition_upload: bool,
    /// Run per-rendition callbacks concurrently instead of one after another.
    pub parallel: bool,
}

/// Input to one activation. Immutable once orchestration begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequest {
    #[serde(default)]
    pub source: Option<SourceDescriptor>,
    #[serde(default)]
    pub renditions: Vec<RenditionInstructions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl WorkRequest {
    pub fn new(source: impl Into<String>, renditions: Vec<RenditionInstructions>) -> Self {
        Self {
            source: Some(SourceDescriptor::Url(source.into())),
            renditions,
            request_id: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}
