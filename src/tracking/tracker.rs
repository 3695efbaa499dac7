use anyhow::{anyhow, Result};
use std::time::Instant;

use super::history::{PlateHistory, DEFAULT_HISTORY_CAPACITY, DEFAULT_MIN_VOTES};
use crate::plate::PlateReading;

/// Consecutive disagreeing readings needed before the tracked identity is replaced.
pub const DEFAULT_MISMATCH_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerSettings {
    pub history_capacity: usize,
    pub min_votes: usize,
    pub mismatch_threshold: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            min_votes: DEFAULT_MIN_VOTES,
            mismatch_threshold: DEFAULT_MISMATCH_THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
    /// No stable plate and no history.
    Empty,
    /// Readings accumulating, or a stable plate not currently backed by the majority.
    Tracking,
    /// Stable plate set and equal to the current majority vote.
    Stable,
}

/// Turns a stream of per-frame readings into a trusted plate identity.
///
/// Acquisition is fast (a plain majority over the window) and abandonment is
/// slow (`mismatch_threshold` consecutive disagreements). Divergent readings
/// below the threshold are dropped as noise and never enter the history.
#[derive(Clone, Debug)]
pub struct StabilityTracker {
    history: PlateHistory,
    stable_plate: Option<String>,
    mismatch_count: u32,
    mismatch_threshold: u32,
    last_detection: Instant,
}

impl StabilityTracker {
    pub fn new(settings: TrackerSettings, now: Instant) -> Result<Self> {
        if settings.mismatch_threshold == 0 {
            return Err(anyhow!("mismatch threshold must be > 0"));
        }
        Ok(Self {
            history: PlateHistory::new(settings.history_capacity, settings.min_votes)?,
            stable_plate: None,
            mismatch_count: 0,
            mismatch_threshold: settings.mismatch_threshold,
            last_detection: now,
        })
    }

    /// Feed one frame's reading (or `None` when OCR produced nothing valid).
    ///
    /// Returns the stable plate after the update.
    pub fn ingest(&mut self, reading: Option<PlateReading>) -> Option<&str> {
        let Some(reading) = reading else {
            return self.stable_plate.as_deref();
        };

        match self.stable_plate.as_deref() {
            Some(stable) if stable != reading.text() => {
                self.mismatch_count += 1;
                if self.mismatch_count >= self.mismatch_threshold {
                    log::info!(
                        "plate identity changed: {} -> {} after {} mismatches",
                        stable,
                        reading.text(),
                        self.mismatch_count
                    );
                    self.history.clear();
                    self.stable_plate = Some(reading.text().to_string());
                    self.history.push(reading);
                    self.mismatch_count = 0;
                } else {
                    log::debug!(
                        "ignoring divergent reading {} (stable={}, streak={})",
                        reading.text(),
                        stable,
                        self.mismatch_count
                    );
                }
            }
            _ => {
                self.mismatch_count = 0;
                self.history.push(reading);
            }
        }

        if let Some(best) = self.history.best_guess() {
            if self.stable_plate.as_deref() != Some(best) {
                log::info!("stable plate acquired: {}", best);
                self.stable_plate = Some(best.to_string());
            }
        }

        self.stable_plate.as_deref()
    }

    /// Currently trusted plate, if any.
    pub fn stable_plate(&self) -> Option<&str> {
        self.stable_plate.as_deref()
    }

    pub fn state(&self) -> TrackingState {
        match self.stable_plate.as_deref() {
            None if self.history.is_empty() => TrackingState::Empty,
            Some(stable) if self.history.best_guess() == Some(stable) => TrackingState::Stable,
            _ => TrackingState::Tracking,
        }
    }

    pub fn mismatch_count(&self) -> u32 {
        self.mismatch_count
    }

    pub fn history(&self) -> &PlateHistory {
        &self.history
    }

    /// Record that a plate box was seen at `now`.
    pub fn mark_detection(&mut self, now: Instant) {
        self.last_detection = now;
    }

    pub fn last_detection(&self) -> Instant {
        self.last_detection
    }

    /// Drop all tracking state. The last detection time is left untouched.
    pub fn reset(&mut self) {
        self.history.clear();
        self.stable_plate = None;
        self.mismatch_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::validate_plate;

    fn reading(text: &str) -> Option<PlateReading> {
        validate_plate(text, 0, Instant::now())
    }

    fn tracker() -> StabilityTracker {
        StabilityTracker::new(TrackerSettings::default(), Instant::now()).unwrap()
    }

    fn stable_on(plate: &str) -> StabilityTracker {
        let mut t = tracker();
        for _ in 0..3 {
            t.ingest(reading(plate));
        }
        assert_eq!(t.stable_plate(), Some(plate));
        t
    }

    #[test]
    fn acquires_on_third_matching_read() {
        let mut t = tracker();
        assert_eq!(t.state(), TrackingState::Empty);
        assert_eq!(t.ingest(reading("34ABC123")), None);
        assert_eq!(t.ingest(reading("34ABC123")), None);
        assert_eq!(t.state(), TrackingState::Tracking);
        assert_eq!(t.ingest(reading("34ABC123")), Some("34ABC123"));
        assert_eq!(t.state(), TrackingState::Stable);
    }

    #[test]
    fn missing_reading_changes_nothing() {
        let mut t = stable_on("34ABC123");
        let before = t.history().len();
        assert_eq!(t.ingest(None), Some("34ABC123"));
        assert_eq!(t.history().len(), before);
        assert_eq!(t.mismatch_count(), 0);
    }

    #[test]
    fn tolerates_two_mismatches() {
        let mut t = stable_on("34ABC123");
        t.ingest(reading("06XYZ999"));
        t.ingest(reading("06XYZ999"));

        assert_eq!(t.stable_plate(), Some("34ABC123"));
        assert_eq!(t.mismatch_count(), 2);
        // divergent readings never enter the history
        assert!(t.history().iter().all(|r| r.text() == "34ABC123"));
    }

    #[test]
    fn third_mismatch_replaces_identity() {
        let mut t = stable_on("34ABC123");
        t.ingest(reading("06XYZ999"));
        t.ingest(reading("06XYZ999"));
        assert_eq!(t.ingest(reading("06XYZ999")), Some("06XYZ999"));

        assert_eq!(t.mismatch_count(), 0);
        let history: Vec<&str> = t.history().iter().map(|r| r.text()).collect();
        assert_eq!(history, vec!["06XYZ999"]);
        assert_eq!(t.state(), TrackingState::Tracking);
    }

    #[test]
    fn matching_read_clears_streak() {
        let mut t = stable_on("34ABC123");
        t.ingest(reading("06XYZ999"));
        t.ingest(reading("06XYZ999"));
        t.ingest(reading("34ABC123"));
        assert_eq!(t.mismatch_count(), 0);

        // streak starts over, two more mismatches are still tolerated
        t.ingest(reading("06XYZ999"));
        t.ingest(reading("06XYZ999"));
        assert_eq!(t.stable_plate(), Some("34ABC123"));
    }

    #[test]
    fn mismatches_need_not_agree_with_each_other() {
        let mut t = stable_on("34ABC123");
        t.ingest(reading("06XYZ999"));
        t.ingest(reading("35KL4411"));
        assert_eq!(t.ingest(reading("01A22")), Some("01A22"));
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut t = stable_on("34ABC123");
        t.ingest(reading("06XYZ999"));
        t.reset();
        assert_eq!(t.state(), TrackingState::Empty);
        assert_eq!(t.stable_plate(), None);
        assert_eq!(t.mismatch_count(), 0);
    }

    #[test]
    fn rejects_zero_threshold() {
        let settings = TrackerSettings {
            mismatch_threshold: 0,
            ..TrackerSettings::default()
        };
        assert!(StabilityTracker::new(settings, Instant::now()).is_err());
    }
}
