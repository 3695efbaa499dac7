//! Frame ingestion sources.
//!
//! - Synthetic source (`stub://...`), always available
//! - Video files and network streams through FFmpeg (feature: ingest-file-ffmpeg)
//!
//! A source yields frames until the stream ends (`Ok(None)`) or capture fails
//! (`Err`). Either one ends the processed-frame sequence.

pub mod capture;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod capture_ffmpeg;

use anyhow::Result;

use crate::frame::Frame;

pub use capture::{CaptureConfig, CaptureSource, SourceStats};

pub trait FrameSource {
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}
