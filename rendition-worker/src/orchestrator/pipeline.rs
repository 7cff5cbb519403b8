//! Per-rendition steps: generate, verify, post-process, describe, upload,
//! report.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use media_types::same_format;
use tracing::{debug, info, warn};

use crate::domain::{Rendition, Source, TerminalOutcome};
use crate::error::ErrorRecord;
use crate::events::{EventSink, OutcomeEvent};
use crate::metadata::{MetadataExtractor, probe};
use crate::metrics::{
    ErrorMetrics, MetricsRecord, MetricsSink, RenditionMetrics, Timer, TimerSet,
};
use crate::postprocess::{PostProcessor, adjust_for_worker_capability, post_process_reason};
use crate::storage::StorageClient;
use crate::transform::PerRenditionTransform;
use crate::utils::fs::{ensure_dir_all, is_file};
use crate::{Error, Result};

/// Collaborators shared by every rendition of one activation.
///
/// Kept apart from the renditions themselves so that renditions can be borrowed
/// mutably while the pipeline is borrowed shared.
pub(crate) struct Pipeline {
    pub storage: Arc<dyn StorageClient>,
    pub events: Arc<dyn EventSink>,
    pub metrics: Arc<dyn MetricsSink>,
    pub post_processor: Option<Arc<dyn PostProcessor>>,
    pub extractor: MetadataExtractor,
    pub timers: TimerSet,
    pub upload_enabled: bool,
    pub max_rendition_size: Option<u64>,
}

/// Runs a caller transform, turning a panic into a `process` error so the
/// activation still reaches finalization.
pub(crate) async fn catch_panic<F>(fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Error::generic(
            format!("transform panicked: {}", panic_message(payload.as_ref())),
            "process",
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Pipeline {
    /// Full per-rendition run: transform, then [`Pipeline::finish`], then report.
    ///
    /// Never fails; a failure is reported and returned as a record.
    pub async fn run_rendition(
        &self,
        source: &Source,
        rendition: &mut Rendition,
        transform: &dyn PerRenditionTransform,
        supported: Option<&[String]>,
    ) -> Option<ErrorRecord> {
        let result = match self.generate(source, rendition, transform, supported).await {
            Ok(()) => self.finish(rendition).await,
            Err(e) => Err(e),
        };
        self.conclude(rendition, result).await
    }

    async fn generate(
        &self,
        source: &Source,
        rendition: &mut Rendition,
        transform: &dyn PerRenditionTransform,
        supported: Option<&[String]>,
    ) -> Result<()> {
        if let Some(supported) = supported {
            self.check_capability(rendition, supported)?;
        }
        ensure_dir_all(rendition.directory())
            .await
            .map_err(|e| e.at("process"))?;

        debug!(rendition = %rendition.name(), "Invoking transform");
        let mut timer = Timer::start();
        let result = catch_panic(transform.transform(source, rendition))
            .await
            .map_err(|e| e.at("process"));
        self.record_processing(rendition, timer.stop());
        result
    }

    fn check_capability(&self, rendition: &mut Rendition, supported: &[String]) -> Result<()> {
        if self.post_processor.is_some() {
            adjust_for_worker_capability(rendition, supported)?;
            return Ok(());
        }
        match rendition.fmt() {
            Some(fmt) if !supported.iter().any(|s| same_format(s, fmt)) => {
                Err(Error::RenditionFormatUnsupported(format!(
                    "worker cannot produce {} and no post-processor is configured",
                    fmt
                )))
            }
            _ => Ok(()),
        }
    }

    /// Everything after the transform: existence check, post-processing,
    /// metadata, size limit and upload.
    pub async fn finish(&self, rendition: &mut Rendition) -> Result<()> {
        if !is_file(rendition.work_path()).await {
            if self.upload_enabled {
                return Err(Error::generic(
                    format!("rendition {} was not generated", rendition.name()),
                    "process",
                ));
            }
            debug!(rendition = %rendition.name(), "No output file, uploads disabled");
            return Ok(());
        }

        self.post_process(rendition).await?;

        let metadata = self.extractor.extract(rendition.path()).await;
        if let (Some(max), Some(size)) = (self.max_rendition_size, metadata.size)
            && size > max
        {
            return Err(Error::RenditionTooLarge(format!(
                "{} is {} bytes, limit is {}",
                rendition.name(),
                size,
                max
            )));
        }
        rendition.set_metadata(metadata);

        if self.upload_enabled {
            let mut timer = Timer::start();
            let result = self
                .storage
                .upload(rendition)
                .await
                .map_err(|e| e.at("upload"));
            let elapsed = timer.stop();
            rendition.timings_mut().upload = Some(elapsed);
            self.timers.add_upload(elapsed);
            result?;
        }
        Ok(())
    }

    async fn post_process(&self, rendition: &mut Rendition) -> Result<()> {
        let Some(post_processor) = &self.post_processor else {
            if rendition.is_forced_post_process() {
                return Err(Error::RenditionFormatUnsupported(format!(
                    "{} needs post-processing but none is configured",
                    rendition.name()
                )));
            }
            return Ok(());
        };

        let mut timer = Timer::start();
        let result = self.decide_and_apply(post_processor.as_ref(), rendition).await;
        self.record_processing(rendition, timer.stop());
        result
    }

    async fn decide_and_apply(
        &self,
        post_processor: &dyn PostProcessor,
        rendition: &Rendition,
    ) -> Result<()> {
        let input = rendition.work_path().to_path_buf();
        let probed = probe(&input).await.map_err(|e| e.at("post_process"))?;
        let reason = post_process_reason(rendition.instructions(), &probed)?;

        if reason.is_none() && !rendition.is_forced_post_process() {
            debug!(rendition = %rendition.name(), "Output already satisfies instructions");
            return Ok(());
        }

        info!(
            rendition = %rendition.name(),
            reason = ?reason,
            forced = rendition.is_forced_post_process(),
            "Post-processing rendition"
        );
        post_processor
            .post_process(&input, rendition, &probed)
            .await
            .map_err(|e| e.at("post_process"))?;

        if input != rendition.path() {
            remove_intermediate(&input).await;
        }
        Ok(())
    }

    fn record_processing(&self, rendition: &mut Rendition, elapsed: std::time::Duration) {
        let timings = rendition.timings_mut();
        timings.processing = Some(timings.processing.unwrap_or_default() + elapsed);
        self.timers.add_processing(elapsed);
    }

    /// Turn a step result into the rendition's terminal outcome.
    pub async fn conclude(
        &self,
        rendition: &mut Rendition,
        result: Result<()>,
    ) -> Option<ErrorRecord> {
        match result {
            Ok(()) => {
                self.report_created(rendition).await;
                None
            }
            Err(error) => Some(self.report_failed(rendition, &error).await),
        }
    }

    async fn report_created(&self, rendition: &mut Rendition) {
        if !rendition.mark_terminal(TerminalOutcome::Created) {
            return;
        }
        info!(rendition = %rendition.name(), "Rendition created");
        self.send_event(&OutcomeEvent::created(rendition)).await;
        self.send_rendition_metrics(rendition).await;
    }

    /// Report a failure. Only the first report for a rendition sends anything.
    pub async fn report_failed(&self, rendition: &mut Rendition, error: &Error) -> ErrorRecord {
        let record = error.record(Some(rendition.name()));
        if !rendition.mark_terminal(TerminalOutcome::Failed) {
            return record;
        }
        warn!(
            rendition = %rendition.name(),
            reason = %error.reason(),
            error = %error,
            "Rendition failed"
        );
        self.send_event(&OutcomeEvent::failed(rendition, error)).await;
        self.send_metrics(&MetricsRecord::Error(ErrorMetrics::from_error(
            error,
            Some(rendition.name()),
        )))
        .await;
        self.send_rendition_metrics(rendition).await;
        record
    }

    async fn send_rendition_metrics(&self, rendition: &Rendition) {
        let metrics = RenditionMetrics::for_rendition(rendition, self.timers.download());
        self.send_metrics(&MetricsRecord::Rendition(metrics)).await;
    }

    async fn send_event(&self, event: &OutcomeEvent) {
        if let Err(e) = self.events.send(event).await {
            warn!(event = event.event_type(), error = %e, "Failed to send event");
        }
    }

    pub async fn send_metrics(&self, record: &MetricsRecord) {
        if let Err(e) = self.metrics.send(record).await {
            warn!(metric = record.name(), error = %e, "Failed to send metrics");
        }
    }
}

async fn remove_intermediate(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "Intermediate file not removed");
    }
}
