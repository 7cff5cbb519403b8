//! Telemetry sink collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::info;

use super::records::MetricsRecord;
use crate::Result;

/// Receives named metrics records.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn send(&self, record: &MetricsRecord) -> Result<()>;
}

/// Writes records to the log under the `rendition_worker::metrics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn send(&self, record: &MetricsRecord) -> Result<()> {
        info!(
            target: "rendition_worker::metrics",
            metric = record.name(),
            payload = %record.payload(),
            "Metrics"
        );
        Ok(())
    }
}

/// Keeps every record in memory. Used by tests and the host binary.
#[derive(Debug, Default)]
pub struct MemoryMetricsSink {
    records: Mutex<Vec<MetricsRecord>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MetricsRecord> {
        self.records.lock().clone()
    }

    /// Payloads of all records with the given name, in arrival order.
    pub fn payloads(&self, name: &str) -> Vec<Value> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.name() == name)
            .map(MetricsRecord::payload)
            .collect()
    }
}

#[async_trait]
impl MetricsSink for MemoryMetricsSink {
    async fn send(&self, record: &MetricsRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::records::ActivationMetrics;

    #[tokio::test]
    async fn test_memory_sink_filters_by_name() {
        let sink = MemoryMetricsSink::new();
        sink.send(&MetricsRecord::Activation(ActivationMetrics::default()))
            .await
            .unwrap();
        sink.send(&MetricsRecord::Timeout(ActivationMetrics::default()))
            .await
            .unwrap();

        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.payloads("timeout").len(), 1);
        assert!(sink.payloads("rendition").is_empty());
    }
}
