//! The per-activation lifecycle.
//!
//! ```text
//! Init -> Preparing -> Processing -> Finalizing -> Done
//!             |                          ^
//!             +--------> Fatal ----------+
//! ```
//!
//! Preparing validates the request and acquires the source. Any failure there is
//! fatal and fails every declared rendition with the same error. Processing
//! isolates failures per rendition. Finalizing always runs: it settles the
//! background tasks, fails whatever is still pending, removes the working
//! directory exactly once and reports the activation metrics.

mod builder;
mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use rendition_common::{ActivationContext, settle_background_tasks};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

pub use builder::OrchestratorBuilder;
use pipeline::Pipeline;

use crate::config::WorkerConfig;
use crate::domain::{
    ActivationFailure, ProcessingResult, Rendition, RenditionState, RenditionSummary, Source,
    SourceSummary, WorkRequest,
};
use crate::error::ErrorRecord;
use crate::events::EventSink;
use crate::metadata::MetadataExtractor;
use crate::metrics::{
    ActivationMetrics, DeadlineWatch, ErrorMetrics, MetricsRecord, MetricsSink, ResourceSampler,
    ResourceUsage, Timer, TimerSet,
};
use crate::postprocess::PostProcessor;
use crate::preparer::SourcePreparer;
use crate::registry::RenditionRegistry;
use crate::storage::StorageClient;
use crate::transform::{BatchTransform, PerRenditionTransform, TransformStrategy};
use crate::utils::fs::{ensure_dir_all, remove_dir_all};
use crate::{Error, Result};

const IN_DIR: &str = "in";
const OUT_DIR: &str = "out";

/// Lifecycle phase of an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Init,
    Preparing,
    Processing,
    Finalizing,
    Done,
    Fatal,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Preparing => "preparing",
            Self::Processing => "processing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one activation. Owns the request and everything derived from it.
pub struct RenditionOrchestrator {
    request: WorkRequest,
    config: WorkerConfig,
    context: ActivationContext,
    strategy: TransformStrategy,
    storage: Arc<dyn StorageClient>,
    events: Arc<dyn EventSink>,
    metrics: Arc<dyn MetricsSink>,
    post_processor: Option<Arc<dyn PostProcessor>>,
}

/// Detached helpers started at prepare time and settled at finalize.
struct BackgroundTasks {
    token: CancellationToken,
    deadline: Option<JoinHandle<bool>>,
    sampler: Option<JoinHandle<ResourceUsage>>,
}

impl BackgroundTasks {
    async fn settle(self) -> ResourceUsage {
        self.token.cancel();

        if let Some(deadline) = self.deadline {
            let (fired, _) = settle_background_tasks(vec![("deadline_watch", deadline)]).await;
            if fired.first().copied().unwrap_or(false) {
                warn!("Activation finished after the deadline flush");
            }
        }

        let Some(sampler) = self.sampler else {
            return ResourceUsage::default();
        };
        let (mut usage, _) = settle_background_tasks(vec![("resource_sampler", sampler)]).await;
        usage.pop().unwrap_or_default()
    }
}

/// What processing produced, handed to finalize.
struct Outcome {
    source: Option<Source>,
    renditions: Vec<Rendition>,
    errors: Vec<ErrorRecord>,
    fatal: Option<Error>,
}

impl RenditionOrchestrator {
    pub fn builder(request: WorkRequest) -> OrchestratorBuilder {
        OrchestratorBuilder::new(request)
    }

    pub fn context(&self) -> &ActivationContext {
        &self.context
    }

    /// Root of this activation's working tree.
    pub fn work_dir(&self) -> PathBuf {
        self.config.work_dir.join(&self.context.activation_id)
    }

    /// Run the activation to completion.
    ///
    /// Returns the result unless preparing failed or the working directory
    /// could not be removed; the partial result is attached in both cases.
    pub async fn run(self) -> std::result::Result<ProcessingResult, ActivationFailure> {
        let span = info_span!(
            "activation",
            activation_id = %self.context.activation_id,
            request_id = self.context.request_id.as_deref().unwrap_or("-"),
        );
        self.execute().instrument(span).await
    }

    async fn execute(self) -> std::result::Result<ProcessingResult, ActivationFailure> {
        let mut state = OrchestratorState::Init;
        let timers = TimerSet::new();
        timers.start_activation();
        info!(
            strategy = self.strategy.name(),
            renditions = self.request.renditions.len(),
            "Activation started"
        );

        let background = self.start_background(&timers);
        let pipeline = Pipeline {
            storage: self.storage.clone(),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
            post_processor: self.post_processor.clone(),
            extractor: MetadataExtractor,
            timers: timers.clone(),
            upload_enabled: !self.request.options.disable_rendition_upload,
            max_rendition_size: self.config.max_rendition_size,
        };
        let work_dir = self.work_dir();

        transition(&mut state, OrchestratorState::Preparing);
        let outcome = match self.prepare(&work_dir, &timers).await {
            Ok((source, mut renditions)) => {
                transition(&mut state, OrchestratorState::Processing);
                let errors = self.process(&pipeline, &source, &mut renditions, &work_dir).await;
                Outcome {
                    source: Some(source),
                    renditions,
                    errors,
                    fatal: None,
                }
            }
            Err(error) => {
                transition(&mut state, OrchestratorState::Fatal);
                self.fail_all(&pipeline, &work_dir, error).await
            }
        };

        transition(&mut state, OrchestratorState::Finalizing);
        let result = self
            .finalize(&pipeline, &timers, background, &work_dir, outcome)
            .await;
        transition(&mut state, OrchestratorState::Done);
        result
    }

    fn start_background(&self, timers: &TimerSet) -> BackgroundTasks {
        let token = self.context.token.child_token();
        let deadline =
            DeadlineWatch::new(self.config.flush_margin, timers.clone(), self.metrics.clone())
                .arm(&self.context, token.clone());
        let sampler = self
            .config
            .resource_sample_interval
            .map(|interval| ResourceSampler::new(interval).spawn(token.clone()));
        BackgroundTasks {
            token,
            deadline,
            sampler,
        }
    }

    /// Validate the request, create the working tree and acquire the source.
    async fn prepare(
        &self,
        work_dir: &Path,
        timers: &TimerSet,
    ) -> Result<(Source, Vec<Rendition>)> {
        let options = &self.request.options;
        let registry = RenditionRegistry::new(
            work_dir.join(OUT_DIR),
            !options.disable_rendition_upload,
        );
        let renditions = registry.build(&self.request.renditions)?;

        let in_dir = work_dir.join(IN_DIR);
        ensure_dir_all(&in_dir).await.map_err(|e| e.at("prepare"))?;
        ensure_dir_all(registry.out_dir())
            .await
            .map_err(|e| e.at("prepare"))?;

        timers.start_download();
        let source = SourcePreparer::new(self.storage.as_ref())
            .prepare(self.request.source.as_ref(), options, &in_dir)
            .await;
        let elapsed = timers.stop_download();
        let source = source?;

        info!(
            source = %source.display_url(),
            name = %source.name,
            download_ms = elapsed.as_millis() as u64,
            "Source prepared"
        );
        Ok((source, renditions))
    }

    /// Fail every declared rendition with the fatal error.
    async fn fail_all(&self, pipeline: &Pipeline, work_dir: &Path, error: Error) -> Outcome {
        error!(error = %error, reason = %error.reason(), "Activation failed while preparing");
        let registry = RenditionRegistry::new(work_dir.join(OUT_DIR), false);
        let mut renditions = registry.unchecked(&self.request.renditions);
        for rendition in renditions.iter_mut() {
            pipeline.report_failed(rendition, &error).await;
        }
        pipeline
            .send_metrics(&MetricsRecord::Error(ErrorMetrics::from_error(&error, None)))
            .await;

        Outcome {
            source: None,
            renditions,
            errors: vec![error.record(None)],
            fatal: Some(error),
        }
    }

    async fn process(
        &self,
        pipeline: &Pipeline,
        source: &Source,
        renditions: &mut [Rendition],
        work_dir: &Path,
    ) -> Vec<ErrorRecord> {
        match &self.strategy {
            TransformStrategy::PerRendition(transform) => {
                self.process_each(pipeline, source, renditions, transform.as_ref())
                    .await
            }
            TransformStrategy::Batch(transform) => {
                let out_dir = work_dir.join(OUT_DIR);
                process_batch(pipeline, source, renditions, transform.as_ref(), &out_dir).await
            }
        }
    }

    async fn process_each(
        &self,
        pipeline: &Pipeline,
        source: &Source,
        renditions: &mut [Rendition],
        transform: &dyn PerRenditionTransform,
    ) -> Vec<ErrorRecord> {
        let supported = transform.supported_formats();
        let supported = supported.as_deref();

        if self.request.options.parallel {
            debug!(count = renditions.len(), "Processing renditions concurrently");
            let runs = renditions.iter_mut().map(move |rendition| {
                pipeline.run_rendition(source, rendition, transform, supported)
            });
            return join_all(runs).await.into_iter().flatten().collect();
        }

        let mut errors = Vec::new();
        for rendition in renditions.iter_mut() {
            if let Some(record) = pipeline
                .run_rendition(source, rendition, transform, supported)
                .await
            {
                errors.push(record);
            }
        }
        errors
    }

    async fn finalize(
        &self,
        pipeline: &Pipeline,
        timers: &TimerSet,
        background: BackgroundTasks,
        work_dir: &Path,
        outcome: Outcome,
    ) -> std::result::Result<ProcessingResult, ActivationFailure> {
        let Outcome {
            source,
            mut renditions,
            mut errors,
            fatal,
        } = outcome;

        let usage = background.settle().await;

        for rendition in renditions.iter_mut().filter(|r| !r.is_terminal()) {
            let error = Error::generic(
                format!("rendition {} was not processed", rendition.name()),
                "finalize",
            );
            errors.push(pipeline.report_failed(rendition, &error).await);
        }

        let cleanup = match remove_dir_all(work_dir).await {
            Ok(()) => {
                debug!(path = %work_dir.display(), "Working directory removed");
                None
            }
            Err(e) => {
                let error = Error::EnvironmentCorrupted {
                    path: work_dir.to_path_buf(),
                    source: e,
                };
                error!(error = %error, "Working directory cleanup failed");
                errors.push(error.record(None));
                Some(error)
            }
        };

        timers.stop_activation();
        let mut metrics = ActivationMetrics::from_snapshot(&timers.snapshot());
        metrics.rendition_count = renditions.len();
        metrics.rendition_failures = renditions
            .iter()
            .filter(|r| r.state() == RenditionState::Failed)
            .count();
        metrics.cpu_usage_max = usage.cpu_usage_max;
        metrics.memory_used_max = usage.memory_used_max;
        pipeline
            .send_metrics(&MetricsRecord::Activation(metrics.clone()))
            .await;

        let result = ProcessingResult {
            request_id: self.context.request_id.clone(),
            activation_id: self.context.activation_id.clone(),
            source: source.as_ref().map(SourceSummary::from),
            renditions: renditions.iter().map(RenditionSummary::from).collect(),
            errors,
            metrics,
        };
        info!(
            created = result.created_count(),
            failed = result.failed_count(),
            duration = result.metrics.duration,
            "Activation finished"
        );

        match (cleanup, fatal) {
            (Some(error), _) | (None, Some(error)) => Err(ActivationFailure::new(error, result)),
            (None, None) => Ok(result),
        }
    }
}

/// Invoke the batch transform once, then finish every rendition on its own.
async fn process_batch(
    pipeline: &Pipeline,
    source: &Source,
    renditions: &mut [Rendition],
    transform: &dyn BatchTransform,
    out_dir: &Path,
) -> Vec<ErrorRecord> {
    debug!(count = renditions.len(), "Invoking batch transform");
    let mut timer = Timer::start();
    let result = pipeline::catch_panic(transform.transform(source, renditions, out_dir))
        .await
        .map_err(|e| e.at("process"));
    let elapsed = timer.stop();
    pipeline.timers.add_processing(elapsed);
    for rendition in renditions.iter_mut() {
        rendition.timings_mut().processing = Some(elapsed);
    }

    let mut errors = Vec::new();
    if let Err(error) = result {
        warn!(error = %error, "Batch transform failed, failing every rendition");
        for rendition in renditions.iter_mut() {
            errors.push(pipeline.report_failed(rendition, &error).await);
        }
        return errors;
    }

    for rendition in renditions.iter_mut() {
        let step = pipeline.finish(rendition).await;
        if let Some(record) = pipeline.conclude(rendition, step).await {
            errors.push(record);
        }
    }
    errors
}

fn transition(state: &mut OrchestratorState, next: OrchestratorState) {
    debug!(from = %state, to = %next, "Activation state");
    *state = next;
}
