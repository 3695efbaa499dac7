//! Plate Gate
//!
//! Turns noisy per-frame licence plate OCR into a small number of trusted,
//! deduplicated access decisions.
//!
//! # Architecture
//!
//! Every frame flows through one `FrameDecisionPipeline`:
//!
//! 1. **Idle reset**: tracking state is dropped once no plate has been seen for the dwell timeout.
//! 2. **Vehicle selection**: the largest vehicle box above the area floor.
//! 3. **Plate selection**: the largest plate box inside the vehicle crop.
//! 4. **Throttled OCR**: every Nth frame, validated against the plate grammar.
//! 5. **Stabilization**: majority vote over a bounded history, with a mismatch
//!    streak required before the tracked identity is replaced.
//! 6. **Cooldown**: at most one decision per plate per cooldown window.
//! 7. **Decision**: allow-list lookup, vehicle description and audit record.
//!
//! Detection, OCR, description and persistence are collaborators behind traits.
//!
//! # Module Structure
//!
//! - `plate`: plate text normalization and validation
//! - `tracking`: history buffer, stability tracker, idle reset
//! - `cooldown`: per-plate rate limiting
//! - `frame`: RGB frames, boxes, annotation
//! - `detect`: detector/OCR traits and backends
//! - `describe`: optional vehicle description service
//! - `storage`: allow-list and access log
//! - `pipeline`: per-frame orchestration and the processed-frame iterator
//! - `ingest`: frame sources
//! - `config`: daemon configuration

use anyhow::Result;
use rusqlite::{Connection, OpenFlags};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod cooldown;
pub mod describe;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod plate;
pub mod storage;
pub mod tracking;

pub use config::GateConfig;
pub use cooldown::{CooldownGate, SharedCooldownGate};
pub use describe::{DescriptionService, UnavailableDescriber, DESCRIPTION_UNAVAILABLE};
#[cfg(feature = "describe-http")]
pub use describe::HttpDescriptionService;
pub use detect::{BackendSet, PlateDetector, TextRecognizer, VehicleDetector};
pub use frame::{AnnotatedFrame, Annotation, BoundingBox, Frame, Rgb};
pub use ingest::{CaptureConfig, CaptureSource, FrameSource};
pub use pipeline::{
    AccessDecisionSink, DecisionEvent, DecisionOutcome, DecisionSink, FrameDecisionPipeline,
    PipelineSettings, PipelineStats, ProcessedFrames, StatusHandle,
};
pub use plate::{validate_plate, PlateReading};
pub use storage::{AccessStore, InMemoryAccessStore, SqliteAccessStore};
pub use tracking::{IdleResetMonitor, PlateHistory, StabilityTracker, TrackingState};

static MEMORY_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// URI for a named, shared-cache in-memory SQLite database unique to this call.
pub fn shared_memory_uri() -> String {
    format!(
        "file:plate_gate_{}_{}?mode=memory&cache=shared",
        std::process::id(),
        MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}

pub(crate) fn now_s() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
