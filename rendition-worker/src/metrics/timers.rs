//! Wall-clock phase timers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A single start/stop stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
    ended: Option<Instant>,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            ended: None,
        }
    }

    /// Stop the timer and return the measured duration.
    ///
    /// Stopping twice keeps the first end mark.
    pub fn stop(&mut self) -> Duration {
        let ended = *self.ended.get_or_insert_with(Instant::now);
        ended.duration_since(self.started)
    }

    /// Elapsed time up to the end mark, or up to now while still running.
    pub fn elapsed(&self) -> Duration {
        match self.ended {
            Some(ended) => ended.duration_since(self.started),
            None => self.started.elapsed(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.ended.is_none()
    }
}

/// Point-in-time view of the activation timers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimerSnapshot {
    /// Overall activation duration (best available).
    pub duration: Duration,
    pub download: Duration,
    /// Cumulative across renditions.
    pub processing: Duration,
    /// Cumulative across renditions.
    pub upload: Duration,
}

#[derive(Debug, Default)]
struct TimerSetInner {
    activation: Option<Timer>,
    download: Option<Timer>,
    processing: Duration,
    upload: Duration,
}

/// Duration accumulators keyed by phase.
///
/// Cloning shares the underlying state, so the deadline watch can read the
/// same timers the orchestrator writes.
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    inner: Arc<Mutex<TimerSetInner>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_activation(&self) {
        self.inner.lock().activation = Some(Timer::start());
    }

    /// Stop the activation timer. No-op when it was never started.
    pub fn stop_activation(&self) -> Duration {
        self.inner
            .lock()
            .activation
            .as_mut()
            .map(Timer::stop)
            .unwrap_or_default()
    }

    pub fn start_download(&self) {
        self.inner.lock().download = Some(Timer::start());
    }

    pub fn stop_download(&self) -> Duration {
        self.inner
            .lock()
            .download
            .as_mut()
            .map(Timer::stop)
            .unwrap_or_default()
    }

    pub fn add_processing(&self, duration: Duration) {
        self.inner.lock().processing += duration;
    }

    pub fn add_upload(&self, duration: Duration) {
        self.inner.lock().upload += duration;
    }

    /// Download duration measured so far.
    pub fn download(&self) -> Duration {
        self.inner
            .lock()
            .download
            .as_ref()
            .map(Timer::elapsed)
            .unwrap_or_default()
    }

    /// Read every timer without stopping any of them.
    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = self.inner.lock();
        TimerSnapshot {
            duration: inner
                .activation
                .as_ref()
                .map(Timer::elapsed)
                .unwrap_or_default(),
            download: inner
                .download
                .as_ref()
                .map(Timer::elapsed)
                .unwrap_or_default(),
            processing: inner.processing,
            upload: inner.upload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_stop_is_sticky() {
        let mut timer = Timer::start();
        std::thread::sleep(Duration::from_millis(5));
        let first = timer.stop();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(timer.stop(), first);
        assert_eq!(timer.elapsed(), first);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_unstarted_timers_report_zero() {
        let timers = TimerSet::new();
        assert_eq!(timers.stop_download(), Duration::ZERO);
        assert_eq!(timers.snapshot(), TimerSnapshot::default());
    }

    #[test]
    fn test_cumulative_phases() {
        let timers = TimerSet::new();
        timers.start_activation();
        timers.add_processing(Duration::from_millis(10));
        timers.add_processing(Duration::from_millis(15));
        timers.add_upload(Duration::from_millis(7));

        let shared = timers.clone();
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.processing, Duration::from_millis(25));
        assert_eq!(snapshot.upload, Duration::from_millis(7));
        assert_eq!(snapshot.download, Duration::ZERO);
    }
}
