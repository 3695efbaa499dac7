//! Temporal stabilization of plate readings.
//!
//! - `history`: bounded window of readings with majority vote
//! - `tracker`: identity state machine over the window
//! - `idle`: dwell-timeout reset of the tracker

mod history;
mod idle;
mod tracker;

pub use history::{PlateHistory, DEFAULT_HISTORY_CAPACITY, DEFAULT_MIN_VOTES};
pub use idle::{IdleResetMonitor, DEFAULT_IDLE_TIMEOUT};
pub use tracker::{StabilityTracker, TrackerSettings, TrackingState, DEFAULT_MISMATCH_THRESHOLD};
