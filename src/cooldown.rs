//! Per-plate rate limiting of decision events.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Minimum interval between two decision events for the same plate.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Last-trigger table keyed by plate string.
///
/// Entries never expire; a plate that re-triggers after the interval simply
/// overwrites its timestamp. A plate absent from the table is eligible.
#[derive(Clone, Debug)]
pub struct CooldownGate {
    interval: Duration,
    last_trigger: HashMap<String, Instant>,
}

impl CooldownGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_trigger: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check eligibility with the configured interval, recording `now` on success.
    pub fn allow(&mut self, key: &str, now: Instant) -> bool {
        self.allow_with_interval(key, now, self.interval)
    }

    pub fn allow_with_interval(&mut self, key: &str, now: Instant, interval: Duration) -> bool {
        if let Some(last) = self.last_trigger.get(key) {
            if now.saturating_duration_since(*last) <= interval {
                return false;
            }
        }
        self.last_trigger.insert(key.to_string(), now);
        true
    }

    pub fn last_trigger(&self, key: &str) -> Option<Instant> {
        self.last_trigger.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_trigger.is_empty()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// Cloneable handle to one cooldown table, for pipelines that share plates.
///
/// The read-modify-write of a key happens under a single lock.
#[derive(Clone, Debug, Default)]
pub struct SharedCooldownGate {
    inner: Arc<Mutex<CooldownGate>>,
}

impl SharedCooldownGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CooldownGate::new(interval))),
        }
    }

    pub fn allow(&self, key: &str, now: Instant) -> Result<bool> {
        let mut gate = self
            .inner
            .lock()
            .map_err(|_| anyhow!("cooldown table lock poisoned"))?;
        Ok(gate.allow(key, now))
    }

    pub fn last_trigger(&self, key: &str) -> Result<Option<Instant>> {
        let gate = self
            .inner
            .lock()
            .map_err(|_| anyhow!("cooldown table lock poisoned"))?;
        Ok(gate.last_trigger(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_once_per_window() {
        let t = Instant::now();
        let mut gate = CooldownGate::default();

        assert!(gate.allow("34ABC123", t));
        assert!(!gate.allow("34ABC123", t + Duration::from_secs(5)));
        assert!(gate.allow("34ABC123", t + Duration::from_millis(10_100)));
    }

    #[test]
    fn boundary_is_exclusive() {
        let t = Instant::now();
        let mut gate = CooldownGate::default();
        assert!(gate.allow("34ABC123", t));
        assert!(!gate.allow("34ABC123", t + DEFAULT_COOLDOWN));
    }

    #[test]
    fn denied_attempt_does_not_extend_window() {
        let t = Instant::now();
        let mut gate = CooldownGate::default();
        assert!(gate.allow("34ABC123", t));
        assert!(!gate.allow("34ABC123", t + Duration::from_secs(9)));
        assert_eq!(gate.last_trigger("34ABC123"), Some(t));
        assert!(gate.allow("34ABC123", t + Duration::from_millis(10_500)));
    }

    #[test]
    fn keys_are_independent() {
        let t = Instant::now();
        let mut gate = CooldownGate::default();
        assert!(gate.allow("34ABC123", t));
        assert!(gate.allow("06XYZ999", t + Duration::from_secs(1)));
        assert_eq!(gate.len(), 2);
    }

    #[test]
    fn custom_interval_overrides_default() {
        let t = Instant::now();
        let mut gate = CooldownGate::default();
        assert!(gate.allow_with_interval("34ABC123", t, Duration::from_secs(1)));
        assert!(gate.allow_with_interval(
            "34ABC123",
            t + Duration::from_secs(2),
            Duration::from_secs(1)
        ));
    }

    #[test]
    fn shared_handles_see_one_table() {
        let t = Instant::now();
        let a = SharedCooldownGate::new(DEFAULT_COOLDOWN);
        let b = a.clone();

        assert!(a.allow("34ABC123", t).unwrap());
        assert!(!b.allow("34ABC123", t + Duration::from_secs(3)).unwrap());
        assert_eq!(b.last_trigger("34ABC123").unwrap(), Some(t));
    }

    #[test]
    fn shared_gate_across_threads() {
        let gate = SharedCooldownGate::new(DEFAULT_COOLDOWN);
        let t = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || gate.allow("34ABC123", t).unwrap())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(granted, 1);
    }
}
