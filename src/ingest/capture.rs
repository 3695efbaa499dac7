//! Capture source selected by URI.
//!
//! `stub://<name>` gives a synthetic gate-camera scene. Anything else (a local
//! video file or a stream URL) is decoded with FFmpeg when the
//! `ingest-file-ffmpeg` feature is enabled.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use super::FrameSource;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::capture_ffmpeg::FfmpegCaptureSource;
use crate::frame::{BoundingBox, Frame, Rgb};

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a capture source.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// `stub://name`, a local file path, or a stream URL.
    pub uri: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// End the stream after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            uri: "stub://gate_camera".to_string(),
            target_fps: 10,
            max_frames: None,
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

pub struct CaptureSource {
    backend: CaptureBackend,
}

enum CaptureBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegCaptureSource),
}

impl CaptureSource {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        if config.uri.trim().is_empty() {
            return Err(anyhow!("capture source URI must not be empty"));
        }
        if config.target_fps == 0 {
            return Err(anyhow!("capture target_fps must be greater than zero"));
        }
        if config.uri.starts_with("stub://") {
            Ok(Self {
                backend: CaptureBackend::Synthetic(SyntheticSource::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: CaptureBackend::Ffmpeg(FfmpegCaptureSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "capturing '{}' requires the ingest-file-ffmpeg feature",
                    config.uri
                ))
            }
        }
    }
}

impl FrameSource for CaptureSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            CaptureBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            CaptureBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CaptureBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            CaptureBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CaptureBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            CaptureBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

/// A grey road with a dark car-sized block crossing it.
///
/// Frames are stamped on a simulated clock advancing one frame interval per
/// frame, so replays behave the same regardless of processing speed.
struct SyntheticSource {
    config: CaptureConfig,
    frame_count: u64,
    clock_origin: Option<Instant>,
}

impl SyntheticSource {
    fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            clock_origin: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.clock_origin = Some(Instant::now());
        log::info!("CaptureSource: connected to {} (synthetic)", self.config.uri);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let origin = self
            .clock_origin
            .ok_or_else(|| anyhow!("synthetic source used before connect"))?;
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        let index = self.frame_count;
        self.frame_count += 1;

        let mut frame = Frame::filled(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, index, Rgb(96, 96, 96))?;
        let span = i64::from(SYNTHETIC_WIDTH + 200);
        let x = (index as i64 * 8) % span - 200;
        let car = BoundingBox::new(x as i32, 200, x as i32 + 200, 330);
        frame.fill_rect(&car, Rgb(30, 30, 40));
        let plate = BoundingBox::new(car.x1 + 70, 300, car.x1 + 130, 318);
        frame.fill_rect(&plate, Rgb(240, 240, 240));

        let captured_at = origin
            .checked_add(frame_offset(self.config.frame_interval(), index))
            .ok_or_else(|| anyhow!("synthetic clock overflow at frame {}", index))?;
        Ok(Some(frame.with_capture_time(captured_at)))
    }

    fn is_healthy(&self) -> bool {
        self.clock_origin.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }
}

/// `interval * index`, exact in nanoseconds for any frame index.
fn frame_offset(interval: Duration, index: u64) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let nanos = interval.as_nanos().saturating_mul(u128::from(index));
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}
