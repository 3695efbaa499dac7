//! FFmpeg-backed capture for video files and stream URLs.
//!
//! Decoded pictures are converted to packed RGB24 in memory. At end of input
//! the decoder is flushed and drained before the source reports `Ok(None)`.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::software::scaling;
use std::time::{Duration, Instant};

use super::capture::{CaptureConfig, SourceStats};
use crate::frame::Frame;

const CONNECT_GRACE: Duration = Duration::from_secs(5);
const MIN_HEALTH_GRACE_MS: u32 = 2_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    Reading,
    Draining,
    Finished,
}

pub(crate) struct FfmpegCaptureSource {
    config: CaptureConfig,
    input: ffmpeg::format::context::Input,
    video_stream: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: Option<scaling::Context>,
    state: DecodeState,
    frame_count: u64,
    connected_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    failed: bool,
}

impl FfmpegCaptureSource {
    pub(crate) fn new(config: CaptureConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.uri)
            .with_context(|| format!("open capture input '{}'", config.uri))?;
        let (video_stream, decoder) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| anyhow!("'{}' has no video stream", config.uri))?;
            let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .context("read video codec parameters")?
                .decoder()
                .video()
                .context("open video decoder")?;
            (stream.index(), decoder)
        };
        log::debug!(
            "capture input {}: stream #{} {}x{}",
            config.uri,
            video_stream,
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            config,
            input,
            video_stream,
            decoder,
            scaler: None,
            state: DecodeState::Reading,
            frame_count: 0,
            connected_at: None,
            last_frame_at: None,
            failed: false,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        self.connected_at = Some(Instant::now());
        log::info!("capture source {} opened via ffmpeg", self.config.uri);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let limit_reached = self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max);
        if limit_reached || self.state == DecodeState::Finished {
            return Ok(None);
        }

        let mut picture = ffmpeg::frame::Video::empty();
        if self.state == DecodeState::Reading {
            if self.read_until_picture(&mut picture)? {
                return self.to_frame(&picture).map(Some);
            }
            self.decoder.send_eof().context("flush video decoder")?;
            self.state = DecodeState::Draining;
        }

        if self.decoder.receive_frame(&mut picture).is_ok() {
            return self.to_frame(&picture).map(Some);
        }
        self.state = DecodeState::Finished;
        log::info!(
            "capture source {} ended after {} frames",
            self.config.uri,
            self.frame_count
        );
        Ok(None)
    }

    /// Feed packets until the decoder yields a picture. False at end of input.
    fn read_until_picture(&mut self, picture: &mut ffmpeg::frame::Video) -> Result<bool> {
        let video_stream = self.video_stream;
        for (stream, packet) in self.input.packets() {
            if stream.index() != video_stream {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                self.failed = true;
                return Err(e).context("decode video packet");
            }
            if self.decoder.receive_frame(picture).is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn to_frame(&mut self, picture: &ffmpeg::frame::Video) -> Result<Frame> {
        let (width, height) = (picture.width(), picture.height());
        let scaler = match self.scaler.take() {
            Some(s) if s.input().width == width && s.input().height == height => s,
            _ => scaling::Context::get(
                picture.format(),
                width,
                height,
                ffmpeg::util::format::pixel::Pixel::RGB24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .context("create RGB converter")?,
        };
        let scaler = self.scaler.insert(scaler);

        let mut rgb = ffmpeg::frame::Video::empty();
        scaler.run(picture, &mut rgb).context("convert picture to RGB")?;
        let pixels = packed_rgb(&rgb)?;
        let frame = Frame::new(pixels, width, height, self.frame_count)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(frame)
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.failed {
            return false;
        }
        match (self.connected_at, self.last_frame_at) {
            (None, _) => false,
            (Some(connected), None) => connected.elapsed() <= CONNECT_GRACE,
            (Some(_), Some(last)) => last.elapsed() <= self.health_grace(),
        }
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }

    /// Six frame intervals, never less than two seconds.
    fn health_grace(&self) -> Duration {
        let frame_ms = 1000 / self.config.target_fps.max(1);
        Duration::from_millis(u64::from(
            frame_ms.saturating_mul(6).max(MIN_HEALTH_GRACE_MS),
        ))
    }
}

/// Copy plane 0 into a tightly packed RGB24 buffer, dropping row padding.
fn packed_rgb(rgb: &ffmpeg::frame::Video) -> Result<Vec<u8>> {
    let row_bytes = rgb.width() as usize * 3;
    let rows = rgb.height() as usize;
    let stride = rgb.stride(0);
    let plane = rgb.data(0);

    if stride == row_bytes {
        return plane
            .get(..row_bytes * rows)
            .map(<[u8]>::to_vec)
            .context("RGB plane is shorter than the picture");
    }
    let mut pixels = Vec::with_capacity(row_bytes * rows);
    for row in plane.chunks(stride).take(rows) {
        pixels.extend_from_slice(row.get(..row_bytes).context("RGB row is truncated")?);
    }
    if pixels.len() != row_bytes * rows {
        return Err(anyhow!("RGB plane is shorter than the picture"));
    }
    Ok(pixels)
}
