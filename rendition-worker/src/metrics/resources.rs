//! Background sampling of CPU and memory usage.

use std::time::Duration;

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Peak values seen while the sampler ran.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    /// Peak global CPU usage in percent.
    pub cpu_usage_max: Option<f32>,
    /// Peak used memory in bytes.
    pub memory_used_max: Option<u64>,
    pub samples: u32,
}

impl ResourceUsage {
    fn record(&mut self, cpu: f32, memory: u64) {
        self.cpu_usage_max = Some(self.cpu_usage_max.map_or(cpu, |max| max.max(cpu)));
        self.memory_used_max = Some(self.memory_used_max.map_or(memory, |max| max.max(memory)));
        self.samples += 1;
    }
}

/// Periodically samples system usage until cancelled.
pub struct ResourceSampler {
    interval: Duration,
}

impl ResourceSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the sampling loop. The task resolves to the collected maxima once
    /// `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<ResourceUsage> {
        tokio::spawn(async move {
            let mut system = System::new_with_specifics(
                RefreshKind::nothing()
                    .with_cpu(CpuRefreshKind::everything())
                    .with_memory(MemoryRefreshKind::everything()),
            );
            let mut usage = ResourceUsage::default();
            let mut ticker = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(samples = usage.samples, "Resource sampler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        system.refresh_cpu_all();
                        system.refresh_memory();
                        usage.record(system.global_cpu_usage(), system.used_memory());
                    }
                }
            }

            usage
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_keeps_maxima() {
        let mut usage = ResourceUsage::default();
        usage.record(10.0, 100);
        usage.record(5.0, 300);
        usage.record(40.0, 200);
        assert_eq!(usage.cpu_usage_max, Some(40.0));
        assert_eq!(usage.memory_used_max, Some(300));
        assert_eq!(usage.samples, 3);
    }

    #[tokio::test]
    async fn test_sampler_stops_on_cancel() {
        let token = CancellationToken::new();
        let handle = ResourceSampler::new(Duration::from_millis(10)).spawn(token.clone());
        tokio::time::sleep(Duration::from_millis(35)).await;
        token.cancel();

        let usage = handle.await.unwrap();
        assert!(usage.samples >= 1);
        assert!(usage.memory_used_max.is_some());
    }
}
