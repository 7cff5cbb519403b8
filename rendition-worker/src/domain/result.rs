//! Activation output.

use serde::Serialize;
use serde_json::Value;

use super::rendition::{Rendition, RenditionMetadata, RenditionState};
use super::source::Source;
use crate::error::{Error, ErrorRecord};
use crate::metrics::ActivationMetrics;

/// Source as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl From<&Source> for SourceSummary {
    fn from(source: &Source) -> Self {
        Self {
            name: source.name.clone(),
            url: source.display_url(),
            mime_type: source.mime_type.clone(),
        }
    }
}

/// Outcome of one rendition, with the upload target stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenditionSummary {
    pub name: String,
    pub state: RenditionState,
    pub instructions: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RenditionMetadata>,
}

impl From<&Rendition> for RenditionSummary {
    fn from(rendition: &Rendition) -> Self {
        Self {
            name: rendition.name().to_string(),
            state: rendition.state(),
            instructions: rendition.redacted_instructions(),
            metadata: rendition.metadata().cloned(),
        }
    }
}

/// Output of an activation, built once during finalize.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub activation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSummary>,
    pub renditions: Vec<RenditionSummary>,
    pub errors: Vec<ErrorRecord>,
    pub metrics: ActivationMetrics,
}

impl ProcessingResult {
    pub fn created_count(&self) -> usize {
        self.renditions
            .iter()
            .filter(|r| r.state == RenditionState::Created)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.renditions
            .iter()
            .filter(|r| r.state == RenditionState::Failed)
            .count()
    }
}

/// A fatal activation failure, carrying the partial result.
#[derive(Debug, thiserror::Error)]
#[error("activation failed: {error}")]
pub struct ActivationFailure {
    #[source]
    pub error: Error,
    pub result: Box<ProcessingResult>,
}

impl ActivationFailure {
    pub fn new(error: Error, result: ProcessingResult) -> Self {
        Self {
            error,
            result: Box::new(result),
        }
    }

    /// True when the working directory could not be removed and the host
    /// should not reuse this process.
    pub fn is_environment_corrupted(&self) -> bool {
        self.error.is_environment_corrupted()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::TerminalOutcome;
    use crate::domain::value_objects::{RenditionInstructions, Target};

    #[test]
    fn test_summary_strips_target() {
        let instructions = RenditionInstructions {
            target: Some(Target::Url("https://bucket.example.com/put?sig=1".into())),
            ..RenditionInstructions::for_format("png")
        };
        let mut rendition = Rendition::new(instructions, "/out", 0);
        rendition.mark_terminal(TerminalOutcome::Created);

        let summary = RenditionSummary::from(&rendition);
        assert_eq!(summary.state, RenditionState::Created);
        assert!(summary.instructions.get("target").is_none());

        let result = ProcessingResult {
            renditions: vec![summary],
            ..Default::default()
        };
        assert_eq!(result.created_count(), 1);
        assert_eq!(result.failed_count(), 0);
    }

    #[test]
    fn test_source_summary_hides_data_payload() {
        let source = Source {
            name: "source.png".into(),
            path: PathBuf::from("/in/source.png"),
            mime_type: Some("image/png".into()),
            url: "data:image/png;base64,AAAA".into(),
            downloaded: true,
        };
        let summary = SourceSummary::from(&source);
        assert_eq!(summary.url, "data:image/png;base64,...");
    }
}
