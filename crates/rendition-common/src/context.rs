//! Per-activation context.
//!
//! One `ActivationContext` exists per activation. It carries the identifiers used
//! for log correlation, the hard external deadline (if the host announced one) and
//! the cancellation token that stops detached helpers such as the deadline watch.

use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Shared context for a single activation.
#[derive(Debug, Clone)]
pub struct ActivationContext {
    /// Unique id of this activation, also used as the working directory name.
    pub activation_id: String,
    /// Caller-supplied request id, if any.
    pub request_id: Option<String>,
    /// Wall-clock instant at which the host will forcibly stop the activation.
    pub deadline: Option<SystemTime>,
    /// Cancelled when the activation finalizes.
    pub token: CancellationToken,
}

impl ActivationContext {
    /// Create a context with a fresh activation id and no deadline.
    pub fn new(request_id: Option<String>) -> Self {
        Self {
            activation_id: Uuid::new_v4().simple().to_string(),
            request_id,
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<SystemTime>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Build a deadline from milliseconds since the Unix epoch.
    pub fn deadline_from_epoch_ms(epoch_ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(epoch_ms)
    }

    /// Time left until `deadline - margin`.
    ///
    /// Returns `None` without a deadline and `Some(Duration::ZERO)` once the
    /// margin has already been reached.
    pub fn time_until_deadline(&self, margin: Duration) -> Option<Duration> {
        let deadline = self.deadline?;
        let flush_at = deadline.checked_sub(margin).unwrap_or(SystemTime::UNIX_EPOCH);
        Some(
            flush_at
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Label used in logs: the request id when known, else the activation id.
    pub fn label(&self) -> &str {
        self.request_id.as_deref().unwrap_or(&self.activation_id)
    }
}

impl Default for ActivationContext {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_ids_are_unique() {
        let a = ActivationContext::new(None);
        let b = ActivationContext::new(None);
        assert_ne!(a.activation_id, b.activation_id);
        assert!(!a.activation_id.contains('-'));
    }

    #[test]
    fn test_no_deadline() {
        let ctx = ActivationContext::new(Some("req-1".to_string()));
        assert_eq!(ctx.time_until_deadline(Duration::from_secs(1)), None);
        assert_eq!(ctx.label(), "req-1");
    }

    #[test]
    fn test_deadline_in_past_is_zero() {
        let ctx = ActivationContext::default()
            .with_deadline(Some(ActivationContext::deadline_from_epoch_ms(1_000)));
        assert_eq!(
            ctx.time_until_deadline(Duration::from_millis(10)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_deadline_in_future_subtracts_margin() {
        let deadline = SystemTime::now() + Duration::from_secs(60);
        let ctx = ActivationContext::default().with_deadline(Some(deadline));
        let left = ctx.time_until_deadline(Duration::from_secs(10)).unwrap();
        assert!(left <= Duration::from_secs(50));
        assert!(left > Duration::from_secs(45));
    }
}
