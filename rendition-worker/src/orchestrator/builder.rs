//! Orchestrator construction.

use std::sync::Arc;

use rendition_common::ActivationContext;

use super::RenditionOrchestrator;
use crate::config::WorkerConfig;
use crate::domain::{ActivationFailure, ProcessingResult, WorkRequest};
use crate::events::{EventSink, TracingEventSink};
use crate::metrics::{MetricsSink, TracingMetricsSink};
use crate::postprocess::PostProcessor;
use crate::storage::{DefaultStorage, StorageClient};
use crate::transform::{BatchTransform, PerRenditionTransform, TransformStrategy};

/// Builder for a [`RenditionOrchestrator`].
///
/// The two terminal methods fix the transform strategy and run the activation.
pub struct OrchestratorBuilder {
    request: WorkRequest,
    config: WorkerConfig,
    context: Option<ActivationContext>,
    storage: Option<Arc<dyn StorageClient>>,
    events: Option<Arc<dyn EventSink>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    post_processor: Option<Arc<dyn PostProcessor>>,
}

impl OrchestratorBuilder {
    pub fn new(request: WorkRequest) -> Self {
        Self {
            request,
            config: WorkerConfig::default(),
            context: None,
            storage: None,
            events: None,
            metrics: None,
            post_processor: None,
        }
    }

    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing context instead of creating one from the request.
    pub fn context(mut self, context: ActivationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageClient>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics_sink(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a post-processor. Without one, generated files are uploaded as-is.
    pub fn post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    /// Build with a fixed strategy without running.
    pub fn build(self, strategy: TransformStrategy) -> RenditionOrchestrator {
        let context = self.context.unwrap_or_else(|| {
            ActivationContext::new(self.request.request_id.clone())
                .with_deadline(self.config.deadline)
        });
        RenditionOrchestrator {
            request: self.request,
            config: self.config,
            context,
            strategy,
            storage: self
                .storage
                .unwrap_or_else(|| Arc::new(DefaultStorage::new(reqwest::Client::new()))),
            events: self.events.unwrap_or_else(|| Arc::new(TracingEventSink)),
            metrics: self.metrics.unwrap_or_else(|| Arc::new(TracingMetricsSink)),
            post_processor: self.post_processor,
        }
    }

    /// Run the activation, invoking `transform` once per rendition.
    pub async fn process_one_at_a_time(
        self,
        transform: Arc<dyn PerRenditionTransform>,
    ) -> Result<ProcessingResult, ActivationFailure> {
        self.build(TransformStrategy::PerRendition(transform))
            .run()
            .await
    }

    /// Run the activation, invoking `transform` once for all renditions.
    pub async fn process_all_at_once(
        self,
        transform: Arc<dyn BatchTransform>,
    ) -> Result<ProcessingResult, ActivationFailure> {
        self.build(TransformStrategy::Batch(transform)).run().await
    }
}
