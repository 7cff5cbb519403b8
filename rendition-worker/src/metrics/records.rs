//! Metrics records sent to the telemetry sink.
//!
//! All durations are seconds as `f64`.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::timers::TimerSnapshot;
use crate::domain::Rendition;
use crate::error::{Error, ErrorReason};

fn secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

/// Per-rendition record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenditionMetrics {
    pub rendition_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendition_format: Option<String>,
    pub download_duration: f64,
    pub processing_duration: f64,
    pub upload_duration: f64,
    /// Processing plus upload.
    pub rendition_duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl RenditionMetrics {
    pub fn for_rendition(rendition: &Rendition, download: Duration) -> Self {
        let timings = rendition.timings();
        Self {
            rendition_name: rendition.name().to_string(),
            rendition_format: rendition.fmt().map(str::to_string),
            download_duration: secs(download),
            processing_duration: secs(timings.processing.unwrap_or_default()),
            upload_duration: secs(timings.upload.unwrap_or_default()),
            rendition_duration: secs(timings.total()),
            size: rendition.metadata().and_then(|m| m.size),
        }
    }
}

/// Aggregate activation record. Also used for the `timeout` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationMetrics {
    pub duration: f64,
    pub download_duration: f64,
    pub processing_duration: f64,
    pub upload_duration: f64,
    pub rendition_count: usize,
    pub rendition_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage_max: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_max: Option<u64>,
}

impl ActivationMetrics {
    pub fn from_snapshot(snapshot: &TimerSnapshot) -> Self {
        Self {
            duration: secs(snapshot.duration),
            download_duration: secs(snapshot.download),
            processing_duration: secs(snapshot.processing),
            upload_duration: secs(snapshot.upload),
            ..Default::default()
        }
    }
}

/// One failure, rendition-level or fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub reason: ErrorReason,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendition_name: Option<String>,
}

impl ErrorMetrics {
    pub fn from_error(error: &Error, rendition_name: Option<&str>) -> Self {
        Self {
            location: error.location().map(str::to_string),
            reason: error.reason(),
            message: error.to_string(),
            rendition_name: rendition_name.map(str::to_string),
        }
    }
}

/// A named metrics record.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsRecord {
    Activation(ActivationMetrics),
    Rendition(RenditionMetrics),
    Error(ErrorMetrics),
    Timeout(ActivationMetrics),
}

impl MetricsRecord {
    /// Record name as seen by the telemetry sink.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activation(_) => "activation",
            Self::Rendition(_) => "rendition",
            Self::Error(_) => "error",
            Self::Timeout(_) => "timeout",
        }
    }

    pub fn payload(&self) -> Value {
        let value = match self {
            Self::Activation(m) | Self::Timeout(m) => serde_json::to_value(m),
            Self::Rendition(m) => serde_json::to_value(m),
            Self::Error(m) => serde_json::to_value(m),
        };
        value.unwrap_or(Value::Null)
    }
}
