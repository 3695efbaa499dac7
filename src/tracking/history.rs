use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::plate::PlateReading;

/// Readings kept for the currently tracked vehicle.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Occurrences a value needs inside the window before it counts as a majority.
pub const DEFAULT_MIN_VOTES: usize = 3;

/// Bounded window of recent validated readings with majority-vote extraction.
///
/// - Oldest readings are evicted first once `capacity` is exceeded
/// - `best_guess` only answers when the leading value has at least `min_votes`
///   occurrences; equal counts resolve to the value seen first in the window
#[derive(Clone, Debug)]
pub struct PlateHistory {
    readings: VecDeque<PlateReading>,
    capacity: usize,
    min_votes: usize,
}

impl PlateHistory {
    pub fn new(capacity: usize, min_votes: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("plate history capacity must be > 0"));
        }
        if min_votes == 0 || min_votes > capacity {
            return Err(anyhow!(
                "plate history min_votes must be in 1..={} (got {})",
                capacity,
                min_votes
            ));
        }
        Ok(Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            min_votes,
        })
    }

    /// Append a reading, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, reading: PlateReading) {
        while self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// Majority value over the current window, if it has enough votes.
    pub fn best_guess(&self) -> Option<&str> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for reading in &self.readings {
            match counts.iter_mut().find(|(text, _)| *text == reading.text()) {
                Some((_, count)) => *count += 1,
                None => counts.push((reading.text(), 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for (text, count) in counts {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((text, count));
            }
        }

        best.filter(|(_, count)| *count >= self.min_votes)
            .map(|(text, _)| text)
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_votes(&self) -> usize {
        self.min_votes
    }

    /// Readings oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PlateReading> {
        self.readings.iter()
    }
}

impl Default for PlateHistory {
    fn default() -> Self {
        Self {
            readings: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
            capacity: DEFAULT_HISTORY_CAPACITY,
            min_votes: DEFAULT_MIN_VOTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::validate_plate;
    use std::time::Instant;

    fn reading(text: &str, frame_index: u64) -> PlateReading {
        validate_plate(text, frame_index, Instant::now()).expect("valid test plate")
    }

    #[test]
    fn three_votes_make_a_majority() {
        let mut history = PlateHistory::default();
        history.push(reading("34ABC123", 1));
        history.push(reading("34ABC123", 2));
        assert_eq!(history.best_guess(), None);

        history.push(reading("34ABC123", 3));
        assert_eq!(history.best_guess(), Some("34ABC123"));
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut history = PlateHistory::default();
        for i in 0..25u64 {
            history.push(reading(&format!("34AB{:03}", i), i));
        }

        assert_eq!(history.len(), DEFAULT_HISTORY_CAPACITY);
        let frames: Vec<u64> = history.iter().map(|r| r.frame_index()).collect();
        assert_eq!(frames, (5..25).collect::<Vec<_>>());
    }

    #[test]
    fn ties_resolve_to_first_seen_value() {
        let mut history = PlateHistory::default();
        for (i, text) in ["06XYZ999", "34ABC123", "34ABC123", "06XYZ999", "06XYZ999", "34ABC123"]
            .iter()
            .enumerate()
        {
            history.push(reading(text, i as u64));
        }
        assert_eq!(history.best_guess(), Some("06XYZ999"));
    }

    #[test]
    fn majority_follows_window_contents() {
        let mut history = PlateHistory::new(4, 3).unwrap();
        for i in 0..3 {
            history.push(reading("34ABC123", i));
        }
        assert_eq!(history.best_guess(), Some("34ABC123"));

        // The second newer reading evicts one of the three votes.
        history.push(reading("06XYZ999", 3));
        history.push(reading("06XYZ999", 4));
        assert_eq!(history.best_guess(), None);
    }

    #[test]
    fn clear_empties_window() {
        let mut history = PlateHistory::default();
        history.push(reading("34ABC123", 1));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.best_guess(), None);
    }

    #[test]
    fn rejects_invalid_construction() {
        assert!(PlateHistory::new(0, 1).is_err());
        assert!(PlateHistory::new(5, 0).is_err());
        assert!(PlateHistory::new(5, 6).is_err());
    }
}
