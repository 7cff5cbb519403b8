//! Application-wide error types.
//!
//! Every error classifies to an [`ErrorReason`] token. That token is what callers
//! see in `rendition_failed` events, so the classified variants keep their
//! messages free of internal detail.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{message}")]
    Generic { message: String, location: String },

    #[error("Source unsupported: {0}")]
    SourceUnsupported(String),

    #[error("Source corrupt: {0}")]
    SourceCorrupt(String),

    #[error("Source format unsupported: {0}")]
    SourceFormatUnsupported(String),

    #[error("Rendition format unsupported: {0}")]
    RenditionFormatUnsupported(String),

    #[error("Rendition too large: {0}")]
    RenditionTooLarge(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error while {op} {}: {source}", .path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Working directory {} could not be removed: {source}", .path.display())]
    EnvironmentCorrupted {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn generic(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            location: location.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The reason token reported for this error.
    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::SourceUnsupported(_) => ErrorReason::SourceUnsupported,
            Self::SourceCorrupt(_) => ErrorReason::SourceCorrupt,
            Self::SourceFormatUnsupported(_) => ErrorReason::SourceFormatUnsupported,
            Self::RenditionFormatUnsupported(_) => ErrorReason::RenditionFormatUnsupported,
            Self::RenditionTooLarge(_) => ErrorReason::RenditionTooLarge,
            _ => ErrorReason::GenericError,
        }
    }

    /// Location tag carried by generic errors.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Generic { location, .. } => Some(location.as_str()),
            Self::Validation(_) => Some("validation"),
            Self::Configuration(_) => Some("configuration"),
            Self::EnvironmentCorrupted { .. } => Some("cleanup"),
            _ => None,
        }
    }

    /// Tag unclassified errors with the phase they surfaced in.
    ///
    /// Classified errors and errors that already carry a location are returned
    /// unchanged.
    pub fn at(self, location: &str) -> Self {
        if self.reason() != ErrorReason::GenericError || self.location().is_some() {
            return self;
        }
        Self::generic(self.to_string(), location)
    }

    /// True for the distinguished "working directory could not be removed" signal.
    pub fn is_environment_corrupted(&self) -> bool {
        matches!(self, Self::EnvironmentCorrupted { .. })
    }

    /// Snapshot of this error suitable for events, metrics and results.
    pub fn record(&self, rendition: Option<&str>) -> ErrorRecord {
        ErrorRecord {
            reason: self.reason(),
            message: self.to_string(),
            location: self.location().map(str::to_string),
            rendition: rendition.map(str::to_string),
        }
    }
}

/// Classified failure reasons, serialized verbatim into outcome events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    GenericError,
    SourceUnsupported,
    SourceCorrupt,
    SourceFormatUnsupported,
    RenditionFormatUnsupported,
    RenditionTooLarge,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenericError => "GenericError",
            Self::SourceUnsupported => "SourceUnsupported",
            Self::SourceCorrupt => "SourceCorrupt",
            Self::SourceFormatUnsupported => "SourceFormatUnsupported",
            Self::RenditionFormatUnsupported => "RenditionFormatUnsupported",
            Self::RenditionTooLarge => "RenditionTooLarge",
        }
    }
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloneable snapshot of a classified error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub reason: ErrorReason,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tokens() {
        assert_eq!(
            Error::generic("boom", "download").reason().as_str(),
            "GenericError"
        );
        assert_eq!(
            Error::SourceCorrupt("bad".into()).reason(),
            ErrorReason::SourceCorrupt
        );
        assert_eq!(
            Error::RenditionTooLarge("big".into()).reason().to_string(),
            "RenditionTooLarge"
        );
        assert_eq!(
            Error::Io(std::io::Error::other("x")).reason(),
            ErrorReason::GenericError
        );
    }

    #[test]
    fn test_at_tags_only_unlocated_generic_errors() {
        let tagged = Error::Io(std::io::Error::other("disk")).at("upload");
        assert_eq!(tagged.location(), Some("upload"));
        assert!(tagged.to_string().contains("disk"));

        let kept = Error::generic("x", "download").at("upload");
        assert_eq!(kept.location(), Some("download"));

        let classified = Error::SourceCorrupt("bad".into()).at("process");
        assert_eq!(classified.reason(), ErrorReason::SourceCorrupt);
        assert_eq!(classified.location(), None);
    }

    #[test]
    fn test_record_serialization() {
        let record = Error::generic("source unreachable", "download").record(Some("rendition0.png"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["reason"], "GenericError");
        assert_eq!(json["location"], "download");
        assert_eq!(json["rendition"], "rendition0.png");
    }
}
