//! Event sink collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use super::OutcomeEvent;
use crate::Result;

/// Receives outcome events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: &OutcomeEvent) -> Result<()>;
}

/// Writes events to the log under the `rendition_worker::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn send(&self, event: &OutcomeEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        info!(
            target: "rendition_worker::events",
            event = event.event_type(),
            payload = %payload,
            "Event"
        );
        Ok(())
    }
}

/// Records events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<OutcomeEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutcomeEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn created(&self) -> usize {
        self.events.lock().iter().filter(|e| e.is_created()).count()
    }

    pub fn failed(&self) -> usize {
        self.events.lock().iter().filter(|e| !e.is_created()).count()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn send(&self, event: &OutcomeEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
