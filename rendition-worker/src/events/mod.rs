//! Outcome events.
//!
//! Every rendition produces exactly one terminal event per activation:
//! `rendition_created` or `rendition_failed`.

mod sink;

use serde::Serialize;
use serde_json::Value;

pub use sink::{EventSink, MemoryEventSink, TracingEventSink};

use crate::domain::{Rendition, RenditionMetadata};
use crate::error::{Error, ErrorReason};

/// Terminal outcome of one rendition. `rendition` holds the instructions with
/// the upload target stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeEvent {
    RenditionCreated {
        rendition: Value,
        metadata: RenditionMetadata,
    },
    #[serde(rename_all = "camelCase")]
    RenditionFailed {
        rendition: Value,
        error_reason: ErrorReason,
        error_message: String,
    },
}

impl OutcomeEvent {
    pub fn created(rendition: &Rendition) -> Self {
        Self::RenditionCreated {
            rendition: rendition.redacted_instructions(),
            metadata: rendition.metadata().cloned().unwrap_or_default(),
        }
    }

    pub fn failed(rendition: &Rendition, error: &Error) -> Self {
        Self::RenditionFailed {
            rendition: rendition.redacted_instructions(),
            error_reason: error.reason(),
            error_message: error.to_string(),
        }
    }

    /// Event type name as sent to the sink.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RenditionCreated { .. } => "rendition_created",
            Self::RenditionFailed { .. } => "rendition_failed",
        }
    }

    pub fn rendition(&self) -> &Value {
        match self {
            Self::RenditionCreated { rendition, .. } | Self::RenditionFailed { rendition, .. } => {
                rendition
            }
        }
    }

    pub fn error_reason(&self) -> Option<ErrorReason> {
        match self {
            Self::RenditionFailed { error_reason, .. } => Some(*error_reason),
            Self::RenditionCreated { .. } => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::RenditionCreated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{RenditionInstructions, Target};

    fn rendition() -> Rendition {
        let instructions = RenditionInstructions {
            target: Some(Target::Url("https://example.com/put?sig=s3cr3t".into())),
            ..RenditionInstructions::for_format("png")
        };
        Rendition::new(instructions, "/out", 0)
    }

    #[test]
    fn test_failed_event_shape() {
        let event = OutcomeEvent::failed(&rendition(), &Error::SourceCorrupt("truncated".into()));
        assert_eq!(event.event_type(), "rendition_failed");
        assert_eq!(event.error_reason(), Some(ErrorReason::SourceCorrupt));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "rendition_failed");
        assert_eq!(json["errorReason"], "SourceCorrupt");
        assert_eq!(json["rendition"]["fmt"], "png");
        assert!(!json.to_string().contains("s3cr3t"));
    }

    #[test]
    fn test_created_event_shape() {
        let event = OutcomeEvent::created(&rendition());
        assert!(event.is_created());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "rendition_created");
        assert!(json["metadata"].is_object());
        assert!(json["rendition"].get("target").is_none());
    }
}
