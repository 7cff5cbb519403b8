//! Rendition entity.

use std::path::{Path, PathBuf};
use std::time::Duration;

use media_types::MediaFormat;
use rendition_common::sanitize_filename;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value_objects::{RenditionInstructions, Target};

/// Lifecycle state of a rendition within one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenditionState {
    /// No terminal event has been sent yet.
    #[default]
    Pending,
    /// `rendition_created` was sent.
    Created,
    /// `rendition_failed` was sent.
    Failed,
}

/// Terminal outcome recorded for a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Created,
    Failed,
}

/// Metadata of a generated rendition file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionMetadata {
    #[serde(rename = "repo:size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "repo:sha256", default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(rename = "tiff:imageWidth", default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(rename = "tiff:imageHeight", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Wall-clock durations measured for a single rendition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenditionTimings {
    pub processing: Option<Duration>,
    pub upload: Option<Duration>,
}

impl RenditionTimings {
    /// Processing plus upload.
    pub fn total(&self) -> Duration {
        self.processing.unwrap_or_default() + self.upload.unwrap_or_default()
    }
}

/// Intermediate file the worker writes when it cannot produce the requested format.
#[derive(Debug, Clone, PartialEq)]
struct Intermediate {
    format: MediaFormat,
    path: PathBuf,
}

/// One requested output of an activation.
#[derive(Debug, Clone)]
pub struct Rendition {
    instructions: RenditionInstructions,
    index: usize,
    directory: PathBuf,
    name: String,
    path: PathBuf,
    intermediate: Option<Intermediate>,
    metadata: Option<RenditionMetadata>,
    state: RenditionState,
    timings: RenditionTimings,
}

impl Rendition {
    /// Create a rendition at `index` whose output lives in `directory`.
    ///
    /// Without an explicit name the file is called `rendition<index>.<fmt>`,
    /// or `rendition<index>` when no format was requested.
    pub fn new(instructions: RenditionInstructions, directory: impl Into<PathBuf>, index: usize) -> Self {
        let directory = directory.into();
        let name = Self::default_name(&instructions, index);
        let path = directory.join(&name);
        Self {
            instructions,
            index,
            directory,
            name,
            path,
            intermediate: None,
            metadata: None,
            state: RenditionState::Pending,
            timings: RenditionTimings::default(),
        }
    }

    fn default_name(instructions: &RenditionInstructions, index: usize) -> String {
        if let Some(name) = instructions.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return sanitize_filename(name);
        }
        match instructions.fmt.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            Some(fmt) => sanitize_filename(&format!("rendition{}.{}", index, fmt)),
            None => format!("rendition{}", index),
        }
    }

    pub fn instructions(&self) -> &RenditionInstructions {
        &self.instructions
    }

    /// Requested output format token.
    pub fn fmt(&self) -> Option<&str> {
        self.instructions.fmt.as_deref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Final output location (what gets uploaded).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target(&self) -> Option<&Target> {
        self.instructions.target.as_ref()
    }

    /// Where the transform must write its output.
    ///
    /// Differs from [`Rendition::path`] only when an intermediate format was forced.
    pub fn work_path(&self) -> &Path {
        self.intermediate
            .as_ref()
            .map(|i| i.path.as_path())
            .unwrap_or(&self.path)
    }

    /// Format the transform is expected to emit.
    pub fn work_format(&self) -> Option<String> {
        match &self.intermediate {
            Some(intermediate) => Some(intermediate.format.extension().to_string()),
            None => self.instructions.fmt.clone(),
        }
    }

    /// Redirect the transform to an intermediate format; post-processing then
    /// produces the requested format at [`Rendition::path`].
    pub fn force_intermediate(&mut self, format: MediaFormat) {
        let path = self
            .directory
            .join(format!("rendition{}-intermediate.{}", self.index, format.extension()));
        self.intermediate = Some(Intermediate { format, path });
    }

    /// Whether post-processing is mandatory because of a forced intermediate.
    pub fn is_forced_post_process(&self) -> bool {
        self.intermediate.is_some()
    }

    pub fn metadata(&self) -> Option<&RenditionMetadata> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, metadata: RenditionMetadata) {
        self.metadata = Some(metadata);
    }

    pub fn timings(&self) -> &RenditionTimings {
        &self.timings
    }

    pub fn timings_mut(&mut self) -> &mut RenditionTimings {
        &mut self.timings
    }

    pub fn state(&self) -> RenditionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state != RenditionState::Pending
    }

    /// Record the terminal outcome.
    ///
    /// Returns `true` only for the first call; every later call is a no-op and
    /// returns `false`, so at most one terminal event is emitted per rendition.
    pub fn mark_terminal(&mut self, outcome: TerminalOutcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = match outcome {
            TerminalOutcome::Created => RenditionState::Created,
            TerminalOutcome::Failed => RenditionState::Failed,
        };
        true
    }

    /// Instructions with the upload target stripped.
    pub fn redacted_instructions(&self) -> Value {
        self.instructions.redacted()
    }
}
