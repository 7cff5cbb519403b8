//! Timing and telemetry.
//!
//! [`TimerSet`] accumulates phase durations during an activation; the records in
//! [`records`] are what ends up at a [`MetricsSink`].

mod deadline;
pub mod records;
mod resources;
mod sink;
mod timers;

pub use deadline::DeadlineWatch;
pub use records::{ActivationMetrics, ErrorMetrics, MetricsRecord, RenditionMetrics};
pub use resources::{ResourceSampler, ResourceUsage};
pub use sink::{MemoryMetricsSink, MetricsSink, TracingMetricsSink};
pub use timers::{Timer, TimerSet, TimerSnapshot};
