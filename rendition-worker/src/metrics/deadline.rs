//! Deadline-aware metrics flush.
//!
//! The host kills the process at the activation deadline. Shortly before that,
//! the watch reports whatever the timers hold so the activation still leaves a
//! trace. It never interrupts processing.

use std::sync::Arc;
use std::time::Duration;

use rendition_common::ActivationContext;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::records::{ActivationMetrics, MetricsRecord};
use super::sink::MetricsSink;
use super::timers::TimerSet;

/// Armed at prepare time, cancelled at finalize.
pub struct DeadlineWatch {
    margin: Duration,
    timers: TimerSet,
    sink: Arc<dyn MetricsSink>,
}

impl DeadlineWatch {
    pub fn new(margin: Duration, timers: TimerSet, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            margin,
            timers,
            sink,
        }
    }

    /// Arm the watch for `ctx`'s deadline.
    ///
    /// Returns `None` when the activation has no deadline. The task resolves to
    /// `true` if the timeout record was sent and `false` if it was cancelled first.
    pub fn arm(self, ctx: &ActivationContext, token: CancellationToken) -> Option<JoinHandle<bool>> {
        let wait = ctx.time_until_deadline(self.margin)?;
        let label = ctx.label().to_string();
        debug!(activation = %label, wait_ms = wait.as_millis() as u64, "Deadline watch armed");

        Some(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(wait) => {
                    let metrics = ActivationMetrics::from_snapshot(&self.timers.snapshot());
                    warn!(
                        activation = %label,
                        duration = metrics.duration,
                        "Activation deadline approaching, flushing metrics"
                    );
                    if let Err(e) = self.sink.send(&MetricsRecord::Timeout(metrics)).await {
                        warn!(activation = %label, error = %e, "Failed to send timeout metrics");
                    }
                    true
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::metrics::MemoryMetricsSink;

    #[tokio::test]
    async fn test_no_deadline_is_not_armed() {
        let sink = Arc::new(MemoryMetricsSink::new());
        let watch = DeadlineWatch::new(Duration::from_secs(1), TimerSet::new(), sink);
        let ctx = ActivationContext::new(None);
        assert!(watch.arm(&ctx, CancellationToken::new()).is_none());
    }

    #[tokio::test]
    async fn test_fires_when_margin_reached() {
        let sink = Arc::new(MemoryMetricsSink::new());
        let timers = TimerSet::new();
        timers.start_activation();
        let watch = DeadlineWatch::new(Duration::from_secs(1), timers, sink.clone());
        let ctx = ActivationContext::new(None)
            .with_deadline(Some(SystemTime::now() + Duration::from_millis(1020)));

        let fired = watch
            .arm(&ctx, CancellationToken::new())
            .unwrap()
            .await
            .unwrap();
        assert!(fired);
        let payloads = sink.payloads("timeout");
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0]["duration"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_cancel_prevents_flush() {
        let sink = Arc::new(MemoryMetricsSink::new());
        let watch = DeadlineWatch::new(Duration::ZERO, TimerSet::new(), sink.clone());
        let ctx = ActivationContext::new(None)
            .with_deadline(Some(SystemTime::now() + Duration::from_secs(60)));
        let token = CancellationToken::new();

        let handle = watch.arm(&ctx, token.clone()).unwrap();
        token.cancel();
        assert!(!handle.await.unwrap());
        assert!(sink.records().is_empty());
    }
}
