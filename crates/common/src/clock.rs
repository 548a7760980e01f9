//! Job timing utilities.
//!
//! Every engine invocation is anchored to a monotonic clock started when
//! the process is spawned. This module provides:
//! - The per-job clock (monotonic elapsed time plus a wall-clock stamp for logs)
//! - Stall detection based on the last observed progress advancement

use std::time::{Duration, Instant};

/// A job clock that provides monotonic elapsed time relative to the
/// moment the engine process was started.
#[derive(Debug, Clone)]
pub struct JobClock {
    /// The instant the job started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl JobClock {
    /// Create a new job clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Time elapsed since the job started.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Seconds elapsed since the job started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at job start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

/// Watchdog that reports when a monotonically increasing value has not
/// advanced for longer than a threshold.
#[derive(Debug, Clone)]
pub struct StallDetector {
    threshold: Duration,
    last_value: f64,
    last_advance: Instant,
}

impl StallDetector {
    /// Create a detector whose window starts now.
    pub fn new(threshold: Duration) -> Self {
        Self::starting_at(threshold, Instant::now())
    }

    /// Create a detector whose window starts at `now`.
    pub fn starting_at(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_value: f64::NEG_INFINITY,
            last_advance: now,
        }
    }

    /// Record an observed value. Returns true if it advanced past the last one.
    pub fn observe(&mut self, value: f64, now: Instant) -> bool {
        if value > self.last_value + 1e-6 {
            self.last_value = value;
            self.last_advance = now;
            true
        } else {
            false
        }
    }

    /// Instant at which the current window runs out.
    pub fn deadline(&self) -> Instant {
        self.last_advance + self.threshold
    }

    /// Time since the last advancement.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_advance)
    }

    /// Returns the idle time once the threshold is exceeded.
    ///
    /// A report restarts the window, so a still-stuck engine is reported
    /// again one threshold later.
    pub fn check(&mut self, now: Instant) -> Option<Duration> {
        let idle = self.idle(now);
        if idle < self.threshold {
            return None;
        }
        self.last_advance = now;
        Some(idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = JobClock::start();
        // Should be very small but non-negative
        assert!(clock.elapsed() < Duration::from_secs(1));
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_stall_detector_reports_after_threshold() {
        let t0 = Instant::now();
        let mut detector = StallDetector::starting_at(Duration::from_secs(10), t0);

        assert!(detector.observe(1.0, t0 + Duration::from_secs(2)));
        assert!(detector.check(t0 + Duration::from_secs(5)).is_none());

        let idle = detector.check(t0 + Duration::from_secs(13)).unwrap();
        assert_eq!(idle, Duration::from_secs(11));
    }

    #[test]
    fn test_stall_detector_ignores_repeated_values() {
        let t0 = Instant::now();
        let mut detector = StallDetector::starting_at(Duration::from_secs(10), t0);

        assert!(detector.observe(3.0, t0));
        assert!(!detector.observe(3.0, t0 + Duration::from_secs(8)));
        assert!(detector.check(t0 + Duration::from_secs(11)).is_some());
    }

    #[test]
    fn test_stall_detector_advancement_resets_window() {
        let t0 = Instant::now();
        let mut detector = StallDetector::starting_at(Duration::from_secs(10), t0);

        assert!(detector.check(t0 + Duration::from_secs(10)).is_some());
        assert!(detector.observe(0.5, t0 + Duration::from_secs(11)));
        assert!(detector.check(t0 + Duration::from_secs(15)).is_none());
        assert_eq!(detector.deadline(), t0 + Duration::from_secs(21));
    }
}
