use std::time::{Duration, Instant};

use super::tracker::StabilityTracker;

/// Gap without a plate detection after which tracking is considered stale.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Resets a tracker once the tracked vehicle has been gone for a dwell timeout.
///
/// Runs once per frame, before detection. Only acts while a stable plate is
/// set, so an idle scene with nothing tracked causes no churn.
#[derive(Clone, Copy, Debug)]
pub struct IdleResetMonitor {
    timeout: Duration,
}

impl IdleResetMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true when the tracker was reset.
    pub fn check_and_maybe_reset(&self, now: Instant, tracker: &mut StabilityTracker) -> bool {
        let idle = now.saturating_duration_since(tracker.last_detection());
        if idle <= self.timeout {
            return false;
        }
        let Some(plate) = tracker.stable_plate() else {
            return false;
        };
        log::info!(
            "no plate seen for {:.1}s, dropping tracked plate {}",
            idle.as_secs_f64(),
            plate
        );
        tracker.reset();
        true
    }
}

impl Default for IdleResetMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::validate_plate;
    use crate::tracking::tracker::TrackerSettings;

    fn stable_tracker(t0: Instant) -> StabilityTracker {
        let mut tracker = StabilityTracker::new(TrackerSettings::default(), t0).unwrap();
        for _ in 0..3 {
            tracker.ingest(validate_plate("34ABC123", 0, t0));
        }
        tracker.mark_detection(t0);
        tracker
    }

    #[test]
    fn resets_after_timeout() {
        let t0 = Instant::now();
        let mut tracker = stable_tracker(t0);
        let monitor = IdleResetMonitor::default();

        assert!(monitor.check_and_maybe_reset(t0 + Duration::from_millis(3100), &mut tracker));
        assert_eq!(tracker.stable_plate(), None);
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn keeps_state_within_timeout() {
        let t0 = Instant::now();
        let mut tracker = stable_tracker(t0);
        let monitor = IdleResetMonitor::default();

        assert!(!monitor.check_and_maybe_reset(t0 + Duration::from_millis(2900), &mut tracker));
        assert_eq!(tracker.stable_plate(), Some("34ABC123"));
    }

    #[test]
    fn ignores_tracker_without_stable_plate() {
        let t0 = Instant::now();
        let mut tracker = StabilityTracker::new(TrackerSettings::default(), t0).unwrap();
        tracker.ingest(validate_plate("34ABC123", 0, t0));
        let monitor = IdleResetMonitor::default();

        assert!(!monitor.check_and_maybe_reset(t0 + Duration::from_secs(60), &mut tracker));
        assert_eq!(tracker.history().len(), 1);
    }
}
